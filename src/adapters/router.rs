//! In-process topic router.
//!
//! Implements [`CommandBus`] with an exact-match topic table. Transports
//! call [`TopicRouter::dispatch`] with every inbound message; the router
//! hands the payload to the handler registered for that topic, on the
//! caller's thread.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use log::{debug, info};

use crate::app::ports::{CommandBus, MessageHandler};
use crate::error::Result;

#[derive(Default)]
pub struct TopicRouter {
    routes: RwLock<HashMap<String, MessageHandler>>,
}

impl TopicRouter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Deliver `payload` to the handler for `topic`. Returns `false` if
    /// nobody is subscribed.
    pub fn dispatch(&self, topic: &str, payload: &str) -> bool {
        // Clone the handler out so it runs without the table lock held;
        // a handler may itself (un)subscribe.
        let handler = self
            .routes
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(topic)
            .cloned();
        match handler {
            Some(handler) => {
                handler(payload);
                true
            }
            None => {
                debug!("Router: no route for '{}'", topic);
                false
            }
        }
    }

    /// Subscribed topics, sorted.
    pub fn topics(&self) -> Vec<String> {
        let mut topics: Vec<String> = self
            .routes
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        topics.sort();
        topics
    }
}

impl CommandBus for TopicRouter {
    fn subscribe(&self, topic: &str, handler: MessageHandler) -> Result<()> {
        self.routes
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(topic.to_string(), handler);
        info!("Router: subscribed '{}'", topic);
        Ok(())
    }

    fn unsubscribe(&self, topic: &str) {
        if self
            .routes
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(topic)
            .is_some()
        {
            info!("Router: unsubscribed '{}'", topic);
        }
    }
}
