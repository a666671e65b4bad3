//! MQTT side of the bridge.
//!
//! [`connect`] opens a `rumqttc` session, subscribes to the output topics on
//! every (re)connect and pushes received publishes into the bus inbox. The
//! returned [`MqttBus`] publishes chat messages back to the broker.

pub mod client;
pub mod error;
pub mod event_loop;

pub use {
    client::{MqttBus, MqttSettings, connect},
    error::{Error, Result},
};
