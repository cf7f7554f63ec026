// Tempo - A minimal Statsd client for Rust
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Types needed for most uses of this library
//!
//! ```
//! use tempo::prelude::*;
//! ```

pub use crate::client::{Client, ClientBuilder, Counted, CountedExt, Gauged, MetricClient, Setted, Timed};
pub use crate::types::{Counter, Gauge, Metric, MetricError, MetricResult, Set, Timer};
