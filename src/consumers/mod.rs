//! Message queue consumers.

pub mod transaction_point;

pub use transaction_point::{TransactionPointConsumer, TRANSACTION_POINT_REPLY_TOPIC, TRANSACTION_POINT_TOPIC};

/// Prefixes `topic` with `namespace` unless the namespace is blank.
pub fn namespaced_topic(namespace: &str, topic: &str) -> String {
    let namespace = namespace.trim();
    if namespace.is_empty() {
        topic.to_string()
    } else {
        format!("{}:{}", namespace, topic)
    }
}
