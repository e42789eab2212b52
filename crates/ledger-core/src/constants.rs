pub const HASH_SIZE: usize = 32;
pub const HASH_HEX_SIZE: usize = HASH_SIZE * 2;
/// Leading hex zeros required by `Blockchain::new`.
pub const DEFAULT_DIFFICULTY: u32 = 4;
