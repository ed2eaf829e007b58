//! Sequence count providers for command generation.
//!
//! A command sender increments the sequence count of its primary header for every
//! transmitted packet. The providers here wrap around at a configurable maximum,
//! defaulting to [MAX_SEQ_COUNT] to match the 14 bit field width.
use crate::MAX_SEQ_COUNT;
use core::cell::Cell;
#[cfg(feature = "std")]
pub use stdmod::*;

/// Core trait for objects which can provide a sequence count.
///
/// The core functions are not mutable on purpose to allow easier usage with
/// static structs when using the interior mutability pattern.
pub trait SequenceCountProvider {
    fn get(&self) -> u16;

    fn increment(&self);

    fn get_and_increment(&self) -> u16 {
        let val = self.get();
        self.increment();
        val
    }
}

/// Simple sequence counter based on [Cell]. Not thread-safe.
#[derive(Clone)]
pub struct SeqCountProviderSimple {
    seq_count: Cell<u16>,
    max_val: u16,
}

impl SeqCountProviderSimple {
    /// Counter which wraps around at [MAX_SEQ_COUNT].
    pub fn new() -> Self {
        Self::new_with_max_val(MAX_SEQ_COUNT)
    }

    pub fn new_with_max_val(max_val: u16) -> Self {
        Self {
            seq_count: Cell::new(0),
            max_val,
        }
    }
}

impl Default for SeqCountProviderSimple {
    fn default() -> Self {
        Self::new()
    }
}

impl SequenceCountProvider for SeqCountProviderSimple {
    fn get(&self) -> u16 {
        self.seq_count.get()
    }

    fn increment(&self) {
        self.get_and_increment();
    }

    fn get_and_increment(&self) -> u16 {
        let curr_count = self.seq_count.get();
        if curr_count == self.max_val {
            self.seq_count.set(0);
        } else {
            self.seq_count.set(curr_count + 1);
        }
        curr_count
    }
}

#[cfg(feature = "std")]
pub mod stdmod {
    use super::*;
    use std::sync::{Arc, Mutex};

    /// Sequence counter which can be shared between threads. Please note that the API
    /// provided by this struct will not panic on [Mutex] lock errors, but it will
    /// yield 0 for the getter functions.
    #[derive(Clone)]
    pub struct SeqCountProviderSync {
        seq_count: Arc<Mutex<u16>>,
        max_val: u16,
    }

    impl SeqCountProviderSync {
        /// Counter which wraps around at [MAX_SEQ_COUNT].
        pub fn new() -> Self {
            Self::new_with_max_val(MAX_SEQ_COUNT)
        }

        pub fn new_with_max_val(max_val: u16) -> Self {
            Self {
                seq_count: Arc::default(),
                max_val,
            }
        }
    }

    impl Default for SeqCountProviderSync {
        fn default() -> Self {
            Self::new()
        }
    }

    impl SequenceCountProvider for SeqCountProviderSync {
        fn get(&self) -> u16 {
            match self.seq_count.lock() {
                Ok(counter) => *counter,
                Err(_) => 0,
            }
        }

        fn increment(&self) {
            self.get_and_increment();
        }

        fn get_and_increment(&self) -> u16 {
            match self.seq_count.lock() {
                Ok(mut counter) => {
                    let val = *counter;
                    if val == self.max_val {
                        *counter = 0;
                    } else {
                        *counter += 1;
                    }
                    val
                }
                Err(_) => 0,
            }
        }
    }
}
