use chrono::{DateTime, Utc};
use metrics::counter;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;
use validator::Validate;

use crate::errors::ServiceError;
use crate::message_queue::{Message, MessageQueue, MessageQueueError};
use crate::services::promo_engine::{ProcessTransaction, PromoEngine};

use super::namespaced_topic;

pub const TRANSACTION_POINT_TOPIC: &str = "mp_transaction_point";
pub const TRANSACTION_POINT_REPLY_TOPIC: &str = "mp_transaction_point.reply";

/// Payload of a `mp_transaction_point` request.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct TransactionPointRequest {
    pub transaction_id: Uuid,
    pub transaction_time: DateTime<Utc>,
    pub customer_id: Uuid,
    #[validate(custom = "crate::handlers::common::validate_positive_decimal")]
    pub act_trx: Decimal,
    #[validate(range(min = 1))]
    pub quantity_origin: i32,
    #[validate(
        length(min = 1),
        custom = "crate::handlers::common::validate_not_blank"
    )]
    pub promo_code: String,
}

impl From<TransactionPointRequest> for ProcessTransaction {
    fn from(req: TransactionPointRequest) -> Self {
        ProcessTransaction {
            transaction_id: req.transaction_id,
            customer_id: req.customer_id,
            promo_code: req.promo_code,
            transaction_time: req.transaction_time,
            act_trx: req.act_trx,
            quantity_origin: req.quantity_origin,
        }
    }
}

/// Successful reply: only what the caller needs to apply the discount.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionPointReply {
    pub transaction_id: Uuid,
    pub prosentase: Decimal,
    pub point: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionPointErrorReply {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transaction_id: Option<Uuid>,
    pub error: String,
    pub message: String,
}

/// Outcome of handling one request message.
#[derive(Debug)]
pub enum Handled {
    /// Publish this payload as the reply and ack.
    Reply(Value),
    /// Transient failure; nack so the queue can redeliver.
    Retry(ServiceError),
}

fn error_reply(transaction_id: Option<Uuid>, err: &ServiceError) -> Value {
    let reply = TransactionPointErrorReply {
        transaction_id,
        error: err.kind().to_string(),
        message: err.response_message(),
    };
    serde_json::to_value(reply).unwrap_or(Value::Null)
}

fn is_transient(err: &ServiceError) -> bool {
    matches!(
        err,
        ServiceError::DatabaseError(_) | ServiceError::QueueError(_)
    )
}

/// Runs one request through the engine and shapes the reply payload.
pub async fn handle_transaction_point(engine: &PromoEngine, message: &Message) -> Handled {
    let request: TransactionPointRequest = match serde_json::from_value(message.payload.clone()) {
        Ok(request) => request,
        Err(e) => {
            warn!(message_id = %message.id, error = %e, "malformed transaction point payload");
            let err = ServiceError::ValidationError(format!("malformed payload: {}", e));
            return Handled::Reply(error_reply(None, &err));
        }
    };

    let transaction_id = request.transaction_id;
    if let Err(e) = request.validate() {
        let err = ServiceError::from(e);
        return Handled::Reply(error_reply(Some(transaction_id), &err));
    }

    match engine.process(request.into()).await {
        Ok(stored) => {
            let reply = TransactionPointReply {
                transaction_id: stored.transaction_id,
                prosentase: stored.prosentase,
                point: stored.point,
            };
            match serde_json::to_value(reply) {
                Ok(value) => Handled::Reply(value),
                Err(e) => Handled::Reply(error_reply(Some(transaction_id), &e.into())),
            }
        }
        Err(err) if is_transient(&err) && message.can_retry() => Handled::Retry(err),
        Err(err) => Handled::Reply(error_reply(Some(transaction_id), &err)),
    }
}

/// Background worker for `mp_transaction_point`.
pub struct TransactionPointConsumer {
    queue: Arc<dyn MessageQueue>,
    engine: PromoEngine,
    request_topic: String,
    reply_topic: String,
    poll_interval: Duration,
}

impl TransactionPointConsumer {
    pub fn new(queue: Arc<dyn MessageQueue>, engine: PromoEngine, poll_interval: Duration) -> Self {
        Self {
            queue,
            engine,
            request_topic: TRANSACTION_POINT_TOPIC.to_string(),
            reply_topic: TRANSACTION_POINT_REPLY_TOPIC.to_string(),
            poll_interval,
        }
    }

    pub fn with_namespace(mut self, namespace: &str) -> Self {
        self.request_topic = namespaced_topic(namespace, TRANSACTION_POINT_TOPIC);
        self.reply_topic = namespaced_topic(namespace, TRANSACTION_POINT_REPLY_TOPIC);
        self
    }

    pub fn request_topic(&self) -> &str {
        &self.request_topic
    }

    pub fn reply_topic(&self) -> &str {
        &self.reply_topic
    }

    /// Takes one message off the topic and handles it. Returns `false` when
    /// the topic was empty.
    pub async fn poll_once(&self) -> Result<bool, MessageQueueError> {
        let Some(message) = self.queue.subscribe(&self.request_topic).await? else {
            return Ok(false);
        };

        debug!(message_id = %message.id, retry = message.retry_count, "transaction point request received");

        match handle_transaction_point(&self.engine, &message).await {
            Handled::Reply(payload) => {
                let reply = message.reply(&self.reply_topic, payload);
                let reply_topic = reply.topic.clone();

                if let Err(e) = self.queue.publish(reply).await {
                    // The transaction is already stored, so redelivery could
                    // only produce a conflict. Release the request and report.
                    error!(
                        message_id = %message.id,
                        reply_topic = %reply_topic,
                        error = %e,
                        "reply could not be published and is lost"
                    );
                    counter!("promo_consumer.replies_lost", 1);
                    if let Err(ack_err) = self.queue.ack(&message.id).await {
                        warn!(message_id = %message.id, error = %ack_err, "failed to ack request after lost reply");
                    }
                    return Err(e);
                }

                self.queue.ack(&message.id).await?;
                counter!("promo_consumer.messages_handled", 1);
            }
            Handled::Retry(err) => {
                warn!(message_id = %message.id, error = %err, "transient failure, message will be redelivered");
                self.queue.nack(&message.id).await?;
                counter!("promo_consumer.messages_retried", 1);
            }
        }

        Ok(true)
    }

    /// Polls until `shutdown` flips to `true`.
    pub fn spawn(self, mut shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        tokio::spawn(async move {
            info!(topic = %self.request_topic, "transaction point consumer started");
            loop {
                if *shutdown.borrow() {
                    break;
                }

                let idle = match self.poll_once().await {
                    Ok(handled) => !handled,
                    Err(e) => {
                        error!(error = %e, "transaction point consumer poll failed");
                        true
                    }
                };

                if idle {
                    tokio::select! {
                        _ = tokio::time::sleep(self.poll_interval) => {}
                        _ = shutdown.changed() => {}
                    }
                }
            }
            info!("transaction point consumer stopped");
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PromoRules;
    use crate::entities::{promo_config, promo_program, promo_transaction};
    use crate::message_queue::InMemoryMessageQueue;
    use crate::repositories::{
        MockConfigRepository, MockProgramRepository, MockTransactionRepository, NewTransaction,
    };
    use crate::services::eligibility::EligibilityResolver;
    use rust_decimal_macros::dec;
    use serde_json::json;

    fn program() -> promo_program::Model {
        promo_program::Model {
            id: Uuid::new_v4(),
            code_key: "PROMO1".into(),
            quota: 100,
            period_start: Utc::now(),
            period_end: Utc::now(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
            deleted_at: None,
        }
    }

    fn config() -> promo_config::Model {
        promo_config::Model {
            id: Uuid::new_v4(),
            quantity: 2,
            min_trx: dec!(50000),
            max_trx: Some(dec!(200000)),
            prosentase: dec!(5),
            program_id: Uuid::new_v4(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
            deleted_at: None,
        }
    }

    fn stored(tx: NewTransaction) -> promo_transaction::Model {
        promo_transaction::Model {
            transaction_id: tx.transaction_id,
            transaction_time: tx.transaction_time,
            customer_id: tx.customer_id,
            promo_code: tx.promo_code,
            quantity_origin: tx.quantity_origin,
            quantity: tx.quantity,
            act_trx: tx.act_trx,
            prosentase: tx.prosentase,
            point: tx.point,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn engine(program_exists: bool, create: Result<(), ServiceError>) -> PromoEngine {
        let mut programs = MockProgramRepository::new();
        programs
            .expect_find_by_code()
            .returning(move |_| Ok(program_exists.then(program)));

        let mut configs = MockConfigRepository::new();
        configs
            .expect_find_eligible()
            .returning(|_| Ok(Some(config())));

        let mut transactions = MockTransactionRepository::new();
        let mut create = Some(create);
        transactions.expect_create().returning(move |tx| {
            match create.take().unwrap_or(Ok(())) {
                Ok(()) => Ok(stored(tx)),
                Err(e) => Err(e),
            }
        });

        let rules = PromoRules::default();
        let resolver = EligibilityResolver::new(Arc::new(configs), &rules);
        PromoEngine::new(Arc::new(programs), Arc::new(transactions), resolver, &rules)
    }

    fn payload(transaction_id: Uuid) -> Value {
        json!({
            "transaction_id": transaction_id,
            "transaction_time": "2023-01-10T00:00:00Z",
            "customer_id": Uuid::new_v4(),
            "act_trx": "100000",
            "quantity_origin": 2,
            "promo_code": "PROMO1"
        })
    }

    #[tokio::test]
    async fn successful_request_replies_with_point() {
        let tx_id = Uuid::new_v4();
        let message = Message::new(TRANSACTION_POINT_TOPIC, payload(tx_id));

        let Handled::Reply(value) = handle_transaction_point(&engine(true, Ok(())), &message).await
        else {
            panic!("expected a reply");
        };

        let reply: TransactionPointReply = serde_json::from_value(value).unwrap();
        assert_eq!(reply.transaction_id, tx_id);
        assert_eq!(reply.prosentase, dec!(5));
        assert_eq!(reply.point, 5000);
    }

    #[tokio::test]
    async fn unknown_program_replies_not_found() {
        let tx_id = Uuid::new_v4();
        let message = Message::new(TRANSACTION_POINT_TOPIC, payload(tx_id));

        let Handled::Reply(value) =
            handle_transaction_point(&engine(false, Ok(())), &message).await
        else {
            panic!("expected a reply");
        };

        let reply: TransactionPointErrorReply = serde_json::from_value(value).unwrap();
        assert_eq!(reply.transaction_id, Some(tx_id));
        assert_eq!(reply.error, "not_found");
    }

    #[tokio::test]
    async fn malformed_payload_replies_validation_error() {
        let message = Message::new(TRANSACTION_POINT_TOPIC, json!({"promo_code": 1}));

        let Handled::Reply(value) = handle_transaction_point(&engine(true, Ok(())), &message).await
        else {
            panic!("expected a reply");
        };

        let reply: TransactionPointErrorReply = serde_json::from_value(value).unwrap();
        assert_eq!(reply.transaction_id, None);
        assert_eq!(reply.error, "validation_error");
    }

    #[tokio::test]
    async fn database_failure_is_retried() {
        let message = Message::new(TRANSACTION_POINT_TOPIC, payload(Uuid::new_v4()));
        let engine = engine(true, Err(ServiceError::db_error("connection reset")));

        assert!(matches!(
            handle_transaction_point(&engine, &message).await,
            Handled::Retry(_)
        ));
    }

    #[tokio::test]
    async fn poll_once_publishes_correlated_reply() {
        let queue = Arc::new(InMemoryMessageQueue::new());
        let consumer = TransactionPointConsumer::new(
            queue.clone(),
            engine(true, Ok(())),
            Duration::from_millis(10),
        );

        let request = Message::new(TRANSACTION_POINT_TOPIC, payload(Uuid::new_v4()));
        let request_id = request.id;
        queue.publish(request).await.unwrap();

        assert!(consumer.poll_once().await.unwrap());
        assert!(!consumer.poll_once().await.unwrap());

        let reply = queue
            .subscribe(TRANSACTION_POINT_REPLY_TOPIC)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(reply.correlation_id, Some(request_id));
        assert_eq!(reply.payload["point"], json!(5000));
        assert_eq!(queue.in_flight(), 1);
    }

    #[tokio::test]
    async fn retried_message_goes_back_on_topic() {
        let queue = Arc::new(InMemoryMessageQueue::new());
        let consumer = TransactionPointConsumer::new(
            queue.clone(),
            engine(true, Err(ServiceError::db_error("connection reset"))),
            Duration::from_millis(10),
        );

        queue
            .publish(Message::new(TRANSACTION_POINT_TOPIC, payload(Uuid::new_v4())))
            .await
            .unwrap();

        assert!(consumer.poll_once().await.unwrap());
        assert_eq!(queue.pending(TRANSACTION_POINT_TOPIC), 1);
        assert_eq!(queue.pending(TRANSACTION_POINT_REPLY_TOPIC), 0);
    }

    #[tokio::test]
    async fn blank_promo_code_replies_validation_error() {
        let mut body = payload(Uuid::new_v4());
        body["promo_code"] = json!("   ");
        let message = Message::new(TRANSACTION_POINT_TOPIC, body);

        let Handled::Reply(value) = handle_transaction_point(&engine(true, Ok(())), &message).await
        else {
            panic!("expected a reply");
        };

        let reply: TransactionPointErrorReply = serde_json::from_value(value).unwrap();
        assert_eq!(reply.error, "validation_error");
    }

    #[tokio::test]
    async fn reply_goes_to_requested_topic() {
        let queue = Arc::new(InMemoryMessageQueue::new());
        let consumer = TransactionPointConsumer::new(
            queue.clone(),
            engine(true, Ok(())),
            Duration::from_millis(10),
        );

        let request = Message::request(
            TRANSACTION_POINT_TOPIC,
            "caller.inbox",
            payload(Uuid::new_v4()),
        );
        queue.publish(request).await.unwrap();

        assert!(consumer.poll_once().await.unwrap());
        assert_eq!(queue.pending("caller.inbox"), 1);
        assert_eq!(queue.pending(TRANSACTION_POINT_REPLY_TOPIC), 0);
    }

    #[tokio::test]
    async fn failed_reply_publish_releases_request() {
        let queue = Arc::new(InMemoryMessageQueue::with_max_size(1));
        let consumer = TransactionPointConsumer::new(
            queue.clone(),
            engine(true, Ok(())),
            Duration::from_millis(10),
        );

        queue
            .publish(Message::new(TRANSACTION_POINT_REPLY_TOPIC, json!({})))
            .await
            .unwrap();
        queue
            .publish(Message::new(TRANSACTION_POINT_TOPIC, payload(Uuid::new_v4())))
            .await
            .unwrap();

        let err = consumer.poll_once().await.unwrap_err();
        assert!(matches!(err, MessageQueueError::QueueFull));
        assert_eq!(queue.in_flight(), 0);
        assert_eq!(queue.pending(TRANSACTION_POINT_TOPIC), 0);
        assert_eq!(queue.pending(TRANSACTION_POINT_REPLY_TOPIC), 1);
    }

    #[tokio::test]
    async fn spawned_worker_stops_on_shutdown() {
        let queue = Arc::new(InMemoryMessageQueue::new());
        let consumer = TransactionPointConsumer::new(
            queue.clone(),
            engine(true, Ok(())),
            Duration::from_millis(5),
        );
        let (tx, rx) = watch::channel(false);

        let handle = consumer.spawn(rx);
        queue
            .publish(Message::new(TRANSACTION_POINT_TOPIC, payload(Uuid::new_v4())))
            .await
            .unwrap();

        tokio::time::timeout(Duration::from_secs(2), async {
            while queue.pending(TRANSACTION_POINT_REPLY_TOPIC) == 0 {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();

        tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .unwrap()
            .unwrap();
    }
}
