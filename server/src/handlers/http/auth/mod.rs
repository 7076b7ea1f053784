pub mod home;
pub mod logout;

// Re-export main handlers
pub use home::handle_home;
pub use logout::handle_logout;
