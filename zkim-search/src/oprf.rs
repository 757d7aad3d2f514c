//! Token generation and OPRF trapdoor derivation (§4.3.1, §4.3.2).

use std::collections::HashSet;

use zkim_crypto::kdf;
use zkim_crypto::oprf as crypto_oprf;
use zkim_crypto::types::{FieldValue, FileMetadata};

use crate::error::SearchError;

/// `generateSearchTokens`: an unordered, deduplicated set of lowercased,
/// trimmed tokens drawn from a file's metadata.
pub fn generate_search_tokens(metadata: &FileMetadata) -> HashSet<String> {
    let mut tokens = HashSet::new();

    push_token(&mut tokens, &metadata.file_name);
    for word in split_words(&metadata.file_name) {
        push_token(&mut tokens, &word);
    }

    if let Some(mime) = &metadata.mime_type {
        push_token(&mut tokens, mime);
    }

    for tag in &metadata.tags {
        push_token(&mut tokens, tag);
    }

    for value in metadata.custom_fields.values() {
        if let FieldValue::Str(s) = value {
            push_token(&mut tokens, s);
        }
    }

    tokens
}

fn push_token(tokens: &mut HashSet<String>, raw: &str) {
    let normalized = raw.trim().to_lowercase();
    if !normalized.is_empty() {
        tokens.insert(normalized);
    }
}

fn split_words(name: &str) -> Vec<String> {
    name.split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(|w| w.to_string())
        .collect()
}

/// Derives an OPRF trapdoor for `token` under `secret_key`. When
/// `enable_oprf` is false, falls back to a deterministic unblinded hash that
/// still hides `token` from observers lacking the key.
pub fn generate_oprf_trapdoor(
    token: &str,
    secret_key: Option<&[u8; crypto_oprf::SCALAR_BYTES]>,
    enable_oprf: bool,
) -> Result<Vec<u8>, SearchError> {
    let key = secret_key.ok_or(SearchError::OprfKeyMissing)?;

    if enable_oprf {
        let scalar = crypto_oprf::bytes_to_scalar(key);
        let point = crypto_oprf::hash_to_point(token.as_bytes());
        Ok(crypto_oprf::scalar_mult(&scalar, &point).to_vec())
    } else {
        Ok(kdf::hash32(&kdf::concat(&[&key[..], token.as_bytes()])).to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use zkim_crypto::types::AccessControl;

    fn sample_metadata() -> FileMetadata {
        let mut custom_fields = HashMap::new();
        custom_fields.insert("department".to_string(), FieldValue::Str("Finance".to_string()));
        custom_fields.insert("priority".to_string(), FieldValue::Number(1.0));
        FileMetadata {
            file_name: "Q3-Report.pdf".to_string(),
            user_id: "user-1".to_string(),
            mime_type: Some("application/pdf".to_string()),
            created_at: 0,
            tags: vec!["Important".to_string(), "Test".to_string()],
            custom_fields,
            access_control: None::<AccessControl>,
        }
    }

    #[test]
    fn tokens_are_lowercased_and_split() {
        let tokens = generate_search_tokens(&sample_metadata());
        assert!(tokens.contains("q3-report.pdf"));
        assert!(tokens.contains("q3"));
        assert!(tokens.contains("report"));
        assert!(tokens.contains("pdf"));
        assert!(tokens.contains("application/pdf"));
        assert!(tokens.contains("important"));
        assert!(tokens.contains("test"));
        assert!(tokens.contains("finance"));
        assert!(!tokens.iter().any(|t| t == "1"));
    }

    #[test]
    fn empty_and_whitespace_tokens_are_dropped() {
        let mut metadata = sample_metadata();
        metadata.tags.push("   ".to_string());
        let tokens = generate_search_tokens(&metadata);
        assert!(!tokens.contains(""));
        assert!(!tokens.contains("   "));
    }

    #[test]
    fn oprf_trapdoor_is_deterministic() {
        let key = [7u8; crypto_oprf::SCALAR_BYTES];
        let a = generate_oprf_trapdoor("hello", Some(&key), true).unwrap();
        let b = generate_oprf_trapdoor("hello", Some(&key), true).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn oprf_trapdoor_differs_across_tokens() {
        let key = [7u8; crypto_oprf::SCALAR_BYTES];
        let a = generate_oprf_trapdoor("hello", Some(&key), true).unwrap();
        let b = generate_oprf_trapdoor("world", Some(&key), true).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn fallback_trapdoor_is_deterministic_and_key_dependent() {
        let key_a = [1u8; crypto_oprf::SCALAR_BYTES];
        let key_b = [2u8; crypto_oprf::SCALAR_BYTES];
        let a1 = generate_oprf_trapdoor("hello", Some(&key_a), false).unwrap();
        let a2 = generate_oprf_trapdoor("hello", Some(&key_a), false).unwrap();
        let b = generate_oprf_trapdoor("hello", Some(&key_b), false).unwrap();
        assert_eq!(a1, a2);
        assert_ne!(a1, b);
    }

    #[test]
    fn missing_key_fails_with_oprf_key_missing() {
        let result = generate_oprf_trapdoor("hello", None, true);
        assert!(matches!(result, Err(SearchError::OprfKeyMissing)));
    }
}
