use sha1::Sha1;
use sha2::{Digest, Sha256};
use tokio::io::{AsyncRead, AsyncReadExt};

const READ_CHUNK_SIZE: usize = 8192;

/// Digests computed from a single pass over some content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentDigests {
    pub md5: String,
    pub sha1: String,
    pub sha256: String,
    pub size: u64,
}

/// Feeds the same bytes into MD5, SHA1 and SHA256 at once.
struct MultiHasher {
    md5: md5::Context,
    sha1: Sha1,
    sha256: Sha256,
    size: u64,
}

impl MultiHasher {
    fn new() -> Self {
        Self {
            md5: md5::Context::new(),
            sha1: Sha1::new(),
            sha256: Sha256::new(),
            size: 0,
        }
    }

    fn update(&mut self, chunk: &[u8]) {
        self.md5.consume(chunk);
        self.sha1.update(chunk);
        self.sha256.update(chunk);
        self.size += chunk.len() as u64;
    }

    fn finalize(self) -> ContentDigests {
        ContentDigests {
            md5: format!("{:x}", self.md5.compute()),
            sha1: hex::encode(self.sha1.finalize()),
            sha256: hex::encode(self.sha256.finalize()),
            size: self.size,
        }
    }
}

pub fn hash_content(data: &[u8]) -> ContentDigests {
    let mut hasher = MultiHasher::new();
    for chunk in data.chunks(READ_CHUNK_SIZE) {
        hasher.update(chunk);
    }
    hasher.finalize()
}

pub async fn hash_reader<R: AsyncRead + Unpin>(mut reader: R) -> anyhow::Result<ContentDigests> {
    let mut hasher = MultiHasher::new();
    let mut buffer = [0u8; READ_CHUNK_SIZE];
    loop {
        let n = reader.read(&mut buffer).await?;
        if n == 0 {
            break;
        }
        hasher.update(&buffer[..n]);
    }
    Ok(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_content() {
        let digests = hash_content(b"hello world");
        assert_eq!(digests.md5, "5eb63bbbe01eeed093cb22bb8f5acdc3");
        assert_eq!(digests.sha1, "2aae6c35c94fcfb415dbe95f408b9ce91ee846ed");
        assert_eq!(
            digests.sha256,
            "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9"
        );
        assert_eq!(digests.size, 11);
    }

    #[test]
    fn test_hash_content_empty() {
        let digests = hash_content(b"");
        assert_eq!(digests.md5, "d41d8cd98f00b204e9800998ecf8427e");
        assert_eq!(digests.sha1, "da39a3ee5e6b4b0d3255bfef95601890afd80709");
        assert_eq!(
            digests.sha256,
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
        assert_eq!(digests.size, 0);
    }

    #[test]
    fn test_hash_content_is_deterministic() {
        let data: Vec<u8> = (0..50_000u32).map(|i| (i % 251) as u8).collect();
        assert_eq!(hash_content(&data), hash_content(&data));
    }

    #[test]
    fn test_digest_lengths() {
        let digests = hash_content(b"0123456789");
        assert_eq!(digests.md5.len(), 32);
        assert_eq!(digests.sha1.len(), 40);
        assert_eq!(digests.sha256.len(), 64);
        assert!(
            digests
                .sha256
                .chars()
                .all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c))
        );
    }

    #[tokio::test]
    async fn test_hash_reader_matches_hash_content() {
        // Spans several read chunks with a ragged tail.
        let data: Vec<u8> = (0..(READ_CHUNK_SIZE * 3 + 17)).map(|i| i as u8).collect();
        let streamed = hash_reader(&data[..]).await.unwrap();
        assert_eq!(streamed, hash_content(&data));
        assert_eq!(streamed.size, data.len() as u64);
    }
}
