pub mod difficulty;
pub mod interaction;
pub mod log;
pub mod pow;
pub mod types;

pub fn timestamp() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
