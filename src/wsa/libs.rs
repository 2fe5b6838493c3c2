//! Libraries every compilation can include by name, without a resolver

const IO: &str = include_str!("lib/io.wsa");
const MEMORY: &str = include_str!("lib/memory.wsa");
const MATH: &str = include_str!("lib/math.wsa");
const BITWISE: &str = include_str!("lib/bitwise.wsa");
const BITWISE_EXTENSIONS: &str = include_str!("lib/bitwise.extensions.wsa");
const VECTOR: &str = include_str!("lib/vector.wsa");
const MEMCONTAINER: &str = include_str!("lib/memcontainer.wsa");

pub const NAMES: &[&str] = &["io", "memory", "math", "bitwise", "vector", "memcontainer"];

/// The source of the built-in library `name`. With extensions enabled a library's extensions
/// variant is preferred when it has one.
pub fn builtin(name: &str, extensions: bool) -> Option<&'static str> {
    let source = match name {
        "io" => IO,
        "memory" => MEMORY,
        "math" => MATH,
        "bitwise" if extensions => BITWISE_EXTENSIONS,
        "bitwise" => BITWISE,
        "vector" => VECTOR,
        "memcontainer" => MEMCONTAINER,
        _ => return None,
    };

    Some(source)
}
