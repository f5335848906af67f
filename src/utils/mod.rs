pub mod code_generator;
pub mod password;
pub mod validation;

pub use code_generator::{
    ALPHABET, CodeSource, ProbeSettings, RandomCodeSource, generate_random_code, generate_unique,
};
pub use validation::{is_valid_email, is_valid_short_code, normalize_email, validate_long_url};

/// 生成高熵随机令牌（用于未配置密钥时的兜底）
pub fn generate_secure_token(length: usize) -> String {
    generate_random_code(length)
}
