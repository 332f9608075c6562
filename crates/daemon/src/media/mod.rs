pub mod ffmpeg;

use sha2::{Digest, Sha256};
use std::path::Path;
use tokio::fs::File;
use tokio::io::{AsyncReadExt, BufReader};

use crate::error::{CoreError, CoreResult};

/// SHA-256 of the file contents, hex encoded. Used as the media id so the same
/// file always maps to the same context.
pub async fn compute_file_checksum(file_path: &Path) -> CoreResult<String> {
    let unreadable =
        |e: std::io::Error| CoreError::SourceUnreadable(format!("{}: {e}", file_path.display()));

    let file = File::open(file_path).await.map_err(unreadable)?;
    let mut reader = BufReader::new(file);
    let mut hasher = Sha256::new();
    let mut buffer = vec![0u8; 8192];

    loop {
        let n = reader.read(&mut buffer).await.map_err(unreadable)?;
        if n == 0 {
            break;
        }
        hasher.update(&buffer[..n]);
    }

    Ok(hex::encode(hasher.finalize()))
}
