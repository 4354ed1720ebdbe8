//! Routes decoded commands to the value store and the pub/sub broker

use crate::protocol::{Command, Response};
use crate::pubsub::{Broker, Session};
use crate::storage::SharedStore;
use std::sync::Arc;
use tracing::debug;

/// Validates each command against the addressed entry and delegates to the
/// store or the broker. Typed failures become wire error responses; they
/// never touch other keys or sessions.
#[derive(Clone)]
pub struct Dispatcher {
    store: SharedStore,
    broker: Arc<Broker>,
}

impl Dispatcher {
    pub fn new(store: SharedStore, broker: Arc<Broker>) -> Self {
        Dispatcher { store, broker }
    }

    /// Execute a command on behalf of one session.
    pub async fn execute(&self, command: Command, session: &mut Session) -> Response {
        debug!("Executing command: {:?}", command);

        match self.apply(command, session).await {
            Ok(response) => response,
            Err(e) => Response::Error(e.to_string()),
        }
    }

    async fn apply(&self, command: Command, session: &mut Session) -> crate::Result<Response> {
        match command {
            Command::Set { key, value } => {
                self.store.write().await.set(&key, &value);
                Ok(Response::Ok)
            }

            Command::Get { key } => match self.store.read().await.get(&key)? {
                Some(value) => Ok(Response::Value(value.to_string())),
                None => Ok(Response::Nil),
            },

            Command::Del { keys } => {
                let removed = self.store.write().await.del(&keys);
                Ok(Response::Integer(removed as i64))
            }

            Command::Incr { key } => {
                let value = self.store.write().await.incr_by(&key, 1)?;
                Ok(Response::Integer(value))
            }

            Command::IncrBy { key, delta } => {
                let value = self.store.write().await.incr_by(&key, delta)?;
                Ok(Response::Integer(value))
            }

            Command::LPush { key, value } => {
                let len = self.store.write().await.lpush(&key, &value)?;
                Ok(Response::Integer(len as i64))
            }

            Command::LPop { key } => match self.store.write().await.lpop(&key)? {
                Some(value) => Ok(Response::Value(value)),
                None => Ok(Response::Nil),
            },

            Command::LLen { key } => {
                let len = self.store.read().await.llen(&key)?;
                Ok(Response::Integer(len as i64))
            }

            Command::HSet { key, field, value } => {
                let created = self.store.write().await.hset(&key, &field, &value)?;
                Ok(Response::Integer(created as i64))
            }

            Command::HGetAll { key } => {
                let pairs = self.store.read().await.hgetall(&key)?;
                Ok(Response::Map(pairs))
            }

            Command::SAdd { key, member } => {
                let added = self.store.write().await.sadd(&key, &member)?;
                Ok(Response::Integer(added as i64))
            }

            Command::SMembers { key } => {
                let members = self.store.read().await.smembers(&key)?;
                Ok(Response::Array(members))
            }

            Command::Subscribe { channels } => {
                for channel in &channels {
                    self.broker.subscribe(session, channel).await;
                }
                Ok(Response::Integer(session.channel_count() as i64))
            }

            Command::Unsubscribe { channels } => {
                self.broker.unsubscribe(session, &channels).await;
                Ok(Response::Integer(session.channel_count() as i64))
            }

            Command::Publish { channel, payload } => {
                let delivered = self.broker.publish(&channel, &payload).await;
                Ok(Response::Integer(delivered as i64))
            }

            Command::Ping => Ok(Response::Pong),

            Command::Info => Ok(Response::Info(self.store.read().await.info())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::Store;

    fn dispatcher() -> (Dispatcher, Arc<Broker>) {
        let broker = Arc::new(Broker::new());
        (
            Dispatcher::new(Store::shared(), Arc::clone(&broker)),
            broker,
        )
    }

    #[tokio::test]
    async fn wrong_type_becomes_an_error_response() {
        let (dispatcher, broker) = dispatcher();
        let mut session = broker.session();

        let response = dispatcher
            .execute(
                Command::LPush {
                    key: "mylist".into(),
                    value: "x".into(),
                },
                &mut session,
            )
            .await;
        assert_eq!(response, Response::Integer(1));

        let response = dispatcher
            .execute(Command::Get { key: "mylist".into() }, &mut session)
            .await;
        match response {
            Response::Error(msg) => assert!(msg.starts_with("WRONGTYPE")),
            other => panic!("expected error response, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn subscribe_reports_the_channel_count() {
        let (dispatcher, broker) = dispatcher();
        let mut session = broker.session();

        let response = dispatcher
            .execute(
                Command::Subscribe {
                    channels: vec!["myevents".into(), "myotherevents".into()],
                },
                &mut session,
            )
            .await;
        assert_eq!(response, Response::Integer(2));

        let response = dispatcher
            .execute(Command::Unsubscribe { channels: vec![] }, &mut session)
            .await;
        assert_eq!(response, Response::Integer(0));
    }

    #[tokio::test]
    async fn publish_reports_recipients() {
        let (dispatcher, broker) = dispatcher();
        let mut publisher = broker.session();
        let mut subscriber = broker.session();
        broker.subscribe(&mut subscriber, "myevents").await;

        let response = dispatcher
            .execute(
                Command::Publish {
                    channel: "myevents".into(),
                    payload: "the number is 0".into(),
                },
                &mut publisher,
            )
            .await;
        assert_eq!(response, Response::Integer(1));
        assert_eq!(
            subscriber.recv().await.unwrap().payload,
            "the number is 0"
        );
    }
}
