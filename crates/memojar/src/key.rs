//! Cache key composition

use crate::encode::{ArgEncoder, bound_length};
use crate::signature::BoundCall;

/// Default maximum cache key length before the whole key is hashed
pub const DEFAULT_MAX_KEY_LENGTH: usize = 128;

/// Key used when a call has no arguments at all
const EMPTY_KEY: &str = "_";

/// Builds cache keys from normalized calls
#[derive(Debug, Clone, Copy)]
pub struct KeyComposer {
    encoder: ArgEncoder,
    max_key_len: usize,
}

impl Default for KeyComposer {
    fn default() -> Self {
        Self::new(ArgEncoder::default(), DEFAULT_MAX_KEY_LENGTH)
    }
}

impl KeyComposer {
    /// Create a composer
    #[must_use]
    pub const fn new(encoder: ArgEncoder, max_key_len: usize) -> Self {
        Self {
            encoder,
            max_key_len,
        }
    }

    /// Compose the key of a bound call.
    ///
    /// Unnamed positional values come first, joined by `_`, followed by every
    /// named value in ascending name order as `_<first 3 chars of name>-<token>`.
    #[must_use]
    pub fn compose(&self, call: &BoundCall) -> String {
        let mut key = call
            .rest()
            .iter()
            .map(|v| self.encoder.encode(v))
            .collect::<Vec<_>>()
            .join("_");

        for (name, value) in call.named() {
            let prefix: String = name.chars().take(3).collect();
            key.push('_');
            key.push_str(&prefix);
            key.push('-');
            key.push_str(&self.encoder.encode(value));
        }

        if key.is_empty() {
            return EMPTY_KEY.to_string();
        }
        bound_length(key, self.max_key_len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signature::{CallArgs, Signature};

    fn compose(sig: &Signature, args: &CallArgs) -> String {
        let bound = sig.bind("f", args).unwrap();
        KeyComposer::default().compose(&bound)
    }

    #[test]
    fn calling_styles_collapse_to_one_key() {
        let sig = Signature::new().param("a").param_with_default("b", 1);
        let k1 = compose(&sig, &CallArgs::new().arg(2));
        let k2 = compose(&sig, &CallArgs::new().arg(2).kwarg("b", 1));
        let k3 = compose(&sig, &CallArgs::new().kwarg("a", 2).kwarg("b", 1));
        assert_eq!(k1, "_a-2__b-1_");
        assert_eq!(k1, k2);
        assert_eq!(k2, k3);
    }

    #[test]
    fn names_are_truncated_to_three_chars() {
        let sig = Signature::new().param("threshold");
        assert_eq!(compose(&sig, &CallArgs::new().arg(5)), "_thr-5_");
    }

    #[test]
    fn residual_positionals_lead_the_key() {
        let sig = Signature::new().param("x").var_args("rest");
        let key = compose(&sig, &CallArgs::new().arg(1).arg(2).arg(3));
        assert_eq!(key, "2__3__x-1_");
    }

    #[test]
    fn string_values_cannot_imitate_another_parameter() {
        let sig = Signature::new().param("x").param("y");
        let k1 = compose(&sig, &CallArgs::new().kwarg("x", "1__y-2").kwarg("y", "3"));
        let k2 = compose(&sig, &CallArgs::new().kwarg("x", "1").kwarg("y", "2__y-3"));
        assert_ne!(k1, k2);
    }

    #[test]
    fn residual_strings_cannot_imitate_a_named_value() {
        let sig = Signature::new().var_args("rest");
        let sig_named = Signature::new().var_args("rest").keyword_only("x", None);
        let residual = compose(&sig, &CallArgs::new().arg(2).arg("x-1"));
        let named = compose(&sig_named, &CallArgs::new().arg(2).kwarg("x", 1));
        assert_ne!(residual, named);
    }

    #[test]
    fn empty_call_has_stable_key() {
        assert_eq!(compose(&Signature::new(), &CallArgs::new()), EMPTY_KEY);
    }

    #[test]
    fn overlong_keys_are_hashed() {
        let mut sig = Signature::new();
        let mut args = CallArgs::new();
        for i in 0..40 {
            let name = format!("p{i:02}");
            sig = sig.param(name.clone());
            args = args.kwarg(name, i);
        }
        let key = compose(&sig, &args);
        assert_eq!(key.len(), 32);
        assert!(key.chars().all(|c| c.is_ascii_hexdigit()));
    }
}
