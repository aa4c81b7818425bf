use rand::rngs::OsRng;
use rand::RngCore;

/// Source of keys for newly uploaded blobs.
pub trait KeyGenerator: Send + Sync {
    fn generate(&self) -> String;
}

pub const KEY_BYTES: usize = 16;

/// 128 bits from the operating system's CSPRNG, hex encoded.
///
/// Keys carry no timestamp or process identity, so they are neither ordered
/// nor guessable from one another.
#[derive(Clone, Copy, Debug, Default)]
pub struct RandomKeyGenerator;

impl KeyGenerator for RandomKeyGenerator {
    fn generate(&self) -> String {
        let mut bytes = [0u8; KEY_BYTES];
        OsRng.fill_bytes(&mut bytes);
        hex::encode(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_key_shape() {
        let key = RandomKeyGenerator.generate();
        assert_eq!(key.len(), KEY_BYTES * 2);
        assert!(key.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
        assert!(crate::store::validate_key(&key).is_ok());
    }

    #[test]
    fn test_concurrent_keys_are_distinct() {
        let generator = Arc::new(RandomKeyGenerator);
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let generator = generator.clone();
                thread::spawn(move || (0..1_000).map(|_| generator.generate()).collect::<Vec<_>>())
            })
            .collect();

        let mut seen = HashSet::new();
        for handle in handles {
            for key in handle.join().unwrap() {
                assert!(seen.insert(key), "duplicate key generated");
            }
        }
        assert_eq!(seen.len(), 8_000);
    }
}
