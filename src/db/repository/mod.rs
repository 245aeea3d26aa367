pub mod invitation;
pub mod membership;
pub mod page_permission;
pub mod site;
pub mod user;

pub use invitation::InvitationRepository;
pub use membership::MembershipRepository;
pub use page_permission::PagePermissionRepository;
pub use site::SiteRepository;
pub use user::UserRepository;
