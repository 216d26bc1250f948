/// Monitor commands forwarded to VICE verbatim.
pub const VICE_COMMANDS: &[&str] = &[
    // machine state
    "bank", "backtrace", "bt", "cpu", "cpuhistory", "chis", "dump", "export", "exp", "goto", "g",
    "io", "next", "n", "registers", "r", "reset", "return", "ret", "screen", "sc", "step", "z",
    "stopwatch", "sw", "undump",
    // labels
    "add_label", "al", "delete_label", "dl", "load_labels", "ll", "save_labels", "sl",
    "show_labels", "shl", "clear_labels", "cl",
    // memory
    ">", "a", "compare", "c", "disass", "d", "fill", "f", "hunt", "h", "i", "ii", "mem", "m",
    "memchar", "mc", "memmapsave", "mmsave", "memmapshow", "mmsh", "memmapzap", "mmzap",
    "memsprite", "ms", "move", "t",
    // checkpoints
    "break", "bk", "command", "condition", "cond", "delete", "del", "disable", "dis", "enable",
    "en", "ignore", "until", "un", "watch", "w", "trace", "tr",
    // monitor
    "device", "dev", "exit", "x", "quit", "radix", "rad", "sidefx", "sfx",
    // disk
    "@", "attach", "autostart", "autoload", "bload", "bl", "block_read", "br", "bsave", "bs",
    "block_write", "bw", "cd", "detach", "dir", "ls", "list", "load", "l", "pwd", "save", "s",
    // misc
    "~", "cartfreeze", "help", "?", "keybuf", "playback", "pb", "print", "p", "record", "rec",
    "resourceget", "resget", "resourceset", "resset", "load_resources", "resload",
    "save_resources", "ressave", "stop", "screenshot", "scrsh", "tapectrl",
];

/// The command word of a console line: everything up to the first space or
/// `$`.
pub fn command_word(line: &str) -> &str {
    let line = line.trim_start();
    let end = line.find([' ', '$']).unwrap_or(line.len());
    &line[..end]
}

pub fn is_vice_command(line: &str) -> bool {
    let word = command_word(line);
    !word.is_empty() && VICE_COMMANDS.iter().any(|c| c.eq_ignore_ascii_case(word))
}
