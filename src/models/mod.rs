pub(crate) mod context_tag_keys;
mod data;
mod data_point;
mod envelope;
mod event_data;
mod message_data;
mod metric_data;
mod sanitize;

pub(crate) use data::*;
pub(crate) use data_point::*;
pub(crate) use envelope::*;
pub(crate) use event_data::*;
pub(crate) use message_data::*;
pub(crate) use metric_data::*;
pub(crate) use sanitize::*;

pub(crate) use crate::Properties;
