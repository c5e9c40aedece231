pub mod dispatcher;
pub mod notify;

pub use dispatcher::{log_refresh_failure, Dispatcher};
pub use notify::{DesktopNotifier, Notifier};
