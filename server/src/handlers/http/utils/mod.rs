pub mod csrf;
pub mod deliver_page;
pub mod headers;

// Re-export commonly used utilities
pub use csrf::{CsrfGuard, CsrfToken};
pub use deliver_page::{PageTemplate, deliver_page, deliver_redirect, internal_error};
