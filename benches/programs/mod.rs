#![allow(dead_code)]

/// Prints the numbers 1 to 1000, one per line
pub const COUNT: &str = "\
include io
push 1
label loop
dup
call println_num
add 1
dup
sub 1001
jumpn loop
pop
";

/// Writes a greeting to the heap and prints it
pub const HELLO_WORLD: &str = "\
include io
push 100
storestr \"Hello, world!\"
push 100
call print_str
call print_newline
";

/// Raises every base below 200 to the 20th power
pub const POWERS: &str = "\
include math
push 1
label loop
dup
push 20
call pow
pop
add 1
dup
sub 200
jumpn loop
pop
";
