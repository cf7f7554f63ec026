// Tempo - A minimal Statsd client for Rust
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

use rand::Rng;

/// Client-side sampling decision for metrics emitted with an explicit
/// sample rate. The rate must already be validated to lie in (0, 1].
pub(crate) struct Sampler {
    rate: f32,
}

impl Sampler {
    pub(crate) fn new(rate: f32) -> Sampler {
        Sampler { rate }
    }

    /// Decide whether this particular emission should be sent.
    pub(crate) fn roll(&self) -> bool {
        if self.rate >= 1.0 {
            return true;
        }

        rand::thread_rng().gen_bool(f64::from(self.rate))
    }
}
