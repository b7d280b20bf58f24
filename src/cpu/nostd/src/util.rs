pub use core::fmt::Write;

cfg_if::cfg_if! {
    if #[cfg(feature="u16_counter")] {
        // smaller counter for cores where every byte of RAM counts
        pub type BlinkCount = u16;
    } else {
        pub type BlinkCount = u32;
    }
}

/// all delays on the board are expressed in milliseconds
pub type Millis = u32;

/// key and value of a greentea message are each at most this many bytes
pub const KV_MAX_LENGTH: usize = 64;

/// maximum length of a rendered assertion message
pub const MESSAGE_MAX_LENGTH: usize = 96;

pub type KvString = heapless::String<KV_MAX_LENGTH>;
pub type MessageString = heapless::String<MESSAGE_MAX_LENGTH>;

/// writes into a bounded string; output that does not fit is truncated instead of failing
pub struct TruncatingWriter<'a, const N: usize>(pub &'a mut heapless::String<N>);

impl<const N: usize> Write for TruncatingWriter<'_, N> {
    fn write_str(&mut self, s: &str) -> core::fmt::Result {
        for c in s.chars() {
            if self.0.push(c).is_err() {
                break;
            }
        }
        Ok(())
    }
}
