use nanoid::nanoid;

// ==========================================
// ID 生成工具 (Identity Utilities)
// ==========================================

/// 字符集不包含 - 和 _，方便双击选中
const ALPHABET: [char; 62] = [
    '0', '1', '2', '3', '4', '5', '6', '7', '8', '9', 'a', 'b', 'c', 'd', 'e', 'f', 'g', 'h', 'i',
    'j', 'k', 'l', 'm', 'n', 'o', 'p', 'q', 'r', 's', 't', 'u', 'v', 'w', 'x', 'y', 'z', 'A', 'B',
    'C', 'D', 'E', 'F', 'G', 'H', 'I', 'J', 'K', 'L', 'M', 'N', 'O', 'P', 'Q', 'R', 'S', 'T', 'U',
    'V', 'W', 'X', 'Y', 'Z',
];

/// 生成全局唯一的实体 ID (NanoID)
///
/// - 长度: 16 字符
/// - 优势: 比 UUID 更短，URL 友好。
#[inline]
pub fn new_id() -> String {
    nanoid!(16, &ALPHABET)
}
