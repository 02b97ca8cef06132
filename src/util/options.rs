use crate::util::constants::*;
use std::default::Default;

fn always_valid<T>(_: &T) -> bool {
    true
}

fn valid_heap_pages(pages: &usize) -> bool {
    *pages > 0 && *pages <= MAX_ARENA_PAGES
}

macro_rules! options {
    ($($name:ident: $type:ty[$validator:expr] = $default:expr),*,) => [
        options!($($name: $type[$validator] = $default),*);
    ];
    ($($name:ident: $type:ty[$validator:expr] = $default:expr),*) => [
        /// Runtime options of a heap. Every option can be overridden by an environment
        /// variable named `ARENAGC_<OPTION>` (for example `ARENAGC_SWEEP_STEP_BUDGET`).
        #[derive(Clone, Debug)]
        pub struct Options {
            $(pub $name: $type),*
        }
        impl Options {
            /// Set an option by its snake-case name. Returns whether the value was accepted.
            /// An unparsable or invalid value leaves the current value in place.
            pub fn set_from_str(&mut self, s: &str, val: &str) -> bool {
                match s {
                    // Parse the given value from str (by env vars or by calling set_from_str()) to the right type
                    $(stringify!($name) => if let Ok(ref val) = val.parse::<$type>() {
                        // Validate
                        let validate_fn = $validator;
                        let is_valid = validate_fn(val);
                        if is_valid {
                            // Only set value if valid.
                            self.$name = val.clone();
                        } else {
                            warn!("Unable to set {}={:?}. Invalid value. Default value will be used.", s, val);
                        }
                        is_valid
                    } else {
                        warn!("Unable to set {}={:?}. Cant parse value. Default value will be used.", s, val);
                        false
                    })*
                    _ => panic!("Invalid Options key: {}", s)
                }
            }

            /// Options with their built-in defaults, ignoring the environment.
            pub fn without_env() -> Self {
                Options {
                    $($name: $default),*
                }
            }

            /// Apply every `ARENAGC_`-prefixed environment variable that names an option.
            pub fn read_env_var_settings(&mut self) {
                const PREFIX: &str = "ARENAGC_";
                for (key, val) in std::env::vars() {
                    // strip the prefix, and get the lower case string
                    if let Some(rest_of_key) = key.strip_prefix(PREFIX) {
                        let lowercase: &str = &rest_of_key.to_lowercase();
                        match lowercase {
                            $(stringify!($name) => { self.set_from_str(lowercase, &val); },)*
                            _ => {}
                        }
                    }
                }
            }
        }
        impl Default for Options {
            fn default() -> Self {
                let mut options = Self::without_env();
                options.read_env_var_settings();
                options
            }
        }
    ]
}

options! {
    // Number of arena pages committed when the heap is created.
    initial_heap_pages: usize [valid_heap_pages] = DEFAULT_INITIAL_HEAP_PAGES,
    // Upper bound of arena pages. The whole range is reserved up front and growth past it
    // fails with ReachedMemoryLimit.
    max_heap_pages:     usize [valid_heap_pages] = DEFAULT_MAX_HEAP_PAGES,
    // Number of objects an incremental sweep step visits before yielding.
    sweep_step_budget:  usize [|v: &usize| *v > 0] = DEFAULT_SWEEP_STEP_BUDGET,
    // Walk the whole arena after every completed collection and check the object layout.
    verify_heap:        bool  [always_valid] = false
}

impl Options {
    /// Check the relations between options that cannot be validated one at a time.
    pub fn validate(&self) -> bool {
        if self.initial_heap_pages > self.max_heap_pages {
            warn!(
                "initial_heap_pages ({}) is larger than max_heap_pages ({})",
                self.initial_heap_pages, self.max_heap_pages
            );
            return false;
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use crate::util::constants::*;
    use crate::util::options::Options;
    use crate::util::test_util::{serial_test, with_cleanup};

    #[test]
    fn no_env_var() {
        serial_test(|| {
            let options = Options::default();
            assert_eq!(options.sweep_step_budget, DEFAULT_SWEEP_STEP_BUDGET);
            assert!(!options.verify_heap);
        })
    }

    #[test]
    fn with_valid_env_var() {
        serial_test(|| {
            with_cleanup(
                || {
                    std::env::set_var("ARENAGC_SWEEP_STEP_BUDGET", "64");

                    let options = Options::default();
                    assert_eq!(options.sweep_step_budget, 64);
                },
                || {
                    std::env::remove_var("ARENAGC_SWEEP_STEP_BUDGET");
                },
            )
        })
    }

    #[test]
    fn with_multiple_valid_env_vars() {
        serial_test(|| {
            with_cleanup(
                || {
                    std::env::set_var("ARENAGC_SWEEP_STEP_BUDGET", "64");
                    std::env::set_var("ARENAGC_VERIFY_HEAP", "true");

                    let options = Options::default();
                    assert_eq!(options.sweep_step_budget, 64);
                    assert!(options.verify_heap);
                },
                || {
                    std::env::remove_var("ARENAGC_SWEEP_STEP_BUDGET");
                    std::env::remove_var("ARENAGC_VERIFY_HEAP");
                },
            )
        })
    }

    #[test]
    fn with_invalid_env_var_value() {
        serial_test(|| {
            with_cleanup(
                || {
                    // zero is rejected by the validator, so use the default value
                    std::env::set_var("ARENAGC_SWEEP_STEP_BUDGET", "0");
                    std::env::set_var("ARENAGC_MAX_HEAP_PAGES", "abc");

                    let options = Options::default();
                    assert_eq!(options.sweep_step_budget, DEFAULT_SWEEP_STEP_BUDGET);
                    assert_eq!(options.max_heap_pages, DEFAULT_MAX_HEAP_PAGES);
                },
                || {
                    std::env::remove_var("ARENAGC_SWEEP_STEP_BUDGET");
                    std::env::remove_var("ARENAGC_MAX_HEAP_PAGES");
                },
            )
        })
    }

    #[test]
    fn with_invalid_env_var_key() {
        serial_test(|| {
            with_cleanup(
                || {
                    std::env::set_var("ARENAGC_ABC", "42");

                    let options = Options::default();
                    assert_eq!(options.sweep_step_budget, DEFAULT_SWEEP_STEP_BUDGET);
                },
                || {
                    std::env::remove_var("ARENAGC_ABC");
                },
            )
        })
    }

    #[test]
    fn max_heap_pages_is_capped() {
        let mut options = Options::without_env();
        assert!(!options.set_from_str("max_heap_pages", "0"));
        assert!(options.set_from_str("max_heap_pages", "32"));
        assert_eq!(options.max_heap_pages, 32);
        #[cfg(target_pointer_width = "32")]
        assert!(!options.set_from_str("max_heap_pages", "65537"));
    }

    #[test]
    fn initial_larger_than_max_is_invalid() {
        let mut options = Options::without_env();
        options.set_from_str("initial_heap_pages", "8");
        options.set_from_str("max_heap_pages", "4");
        assert!(!options.validate());
        options.set_from_str("max_heap_pages", "8");
        assert!(options.validate());
    }
}
