use log::error;

/// Blocking, user-visible notification for failures the user has to act on
pub trait Alert: Send + Sync {
    fn alert(&self, message: &str);
}

/// Terminal stand-in for a modal alert
#[derive(Debug, Default, Clone, Copy)]
pub struct LogAlert;

impl Alert for LogAlert {
    fn alert(&self, message: &str) {
        error!("{}", message);
        eprintln!("\n!! {}\n", message);
    }
}
