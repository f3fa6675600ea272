use crate::utils::validation::sanitize_name;
use rand::Rng;

/// Number of shard directories files are spread across inside a realm
pub const SHARD_COUNT: u32 = 256;

/// Maps a raw random draw onto a shard bucket in `0..SHARD_COUNT`.
pub fn shard_bucket(draw: u32) -> u8 {
    (draw % SHARD_COUNT) as u8
}

/// Builds the storage-relative path of a finished upload:
/// `<realm_id>/<shard>/<upload_id>/<sanitized file name>`.
///
/// The shard is rendered as two lowercase hex digits so every realm has at
/// most 256 fixed-width subdirectories.
pub fn generate_path<R: Rng + ?Sized>(
    rng: &mut R,
    realm_id: i32,
    upload_id: &str,
    uploaded_file_name: &str,
) -> String {
    let shard = shard_bucket(rng.r#gen());
    format!(
        "{}/{:02x}/{}/{}",
        realm_id,
        shard,
        upload_id,
        sanitize_name(uploaded_file_name)
    )
}
