//! Cluster response dispatch.
//!
//! A delivered response is looked up in the [`SchemaTable`](crate::clusters::SchemaTable),
//! decoded into [`ResponseFields`] and handed to the
//! [`CallbackRegistry`](crate::callback::CallbackRegistry) under the context it was
//! tagged with.

mod dispatcher;
mod fields;

pub use dispatcher::{ResponseDispatcher, decode_list_attribute, decode_response};
pub use fields::{
    DecodedField, DecodedValue, ResponseFields, decode_fields, decode_payload, decode_value,
};
