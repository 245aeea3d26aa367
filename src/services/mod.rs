pub mod auth;
pub mod init;
pub mod invitations;
pub mod maintenance;
pub mod members;
pub mod permissions;
pub mod site_resolver;
pub mod sites;
