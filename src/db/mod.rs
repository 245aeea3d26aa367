pub mod models;
pub mod repository;

pub use models::{
    AccessLevel, CreateInvitation, Language, Membership, MembershipStatus, PageName,
    PagePermission, Role, Site, SiteInvitation, SiteWithRole, Theme, Units, UpdateSite, User,
};
pub use repository::{
    InvitationRepository, MembershipRepository, PagePermissionRepository, SiteRepository,
    UserRepository,
};
