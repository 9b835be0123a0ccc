use tokio::sync::mpsc;

/// A transient, non-blocking message for the user
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Toast {
    pub message: String,
}

/// Where client operations report user-visible failures. Nothing in this crate
/// returns errors to the rendering layer; it pushes toasts here instead.
#[derive(Clone, Debug)]
pub struct Notices(mpsc::UnboundedSender<Toast>);

impl Notices {
    pub fn channel() -> (Notices, mpsc::UnboundedReceiver<Toast>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Notices(sender), receiver)
    }

    pub fn push(&self, message: impl Into<String>) {
        let message = message.into();
        tracing::debug!(%message, "toast");
        // toasts nobody receives are dropped
        let _ = self.0.send(Toast { message });
    }
}
