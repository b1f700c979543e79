use conduit_match::Expr;
use conduit_message::MessageEnvelope;
use tokio::sync::mpsc;

/// One registered fan-out target: a Filter or Output supervisor's name,
/// compiled matcher, and inbound channel.
pub struct Route {
    pub name: String,
    pub expr: Expr,
    pub sender: mpsc::Sender<MessageEnvelope>,
}
