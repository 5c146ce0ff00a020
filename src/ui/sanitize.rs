/// Make broker-supplied text safe to draw.
///
/// Message ids, properties and bodies come from whoever produced the message,
/// so escape sequences are replaced with visible placeholders instead of
/// reaching the terminal. Other control characters become U+FFFD; tabs and
/// carriage returns are kept, newlines only when `allow_newlines` is set.
pub fn sanitize_for_terminal(input: &str, allow_newlines: bool) -> String {
    let mut out = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch != '\x1b' {
            match ch {
                '\n' if allow_newlines => out.push(ch),
                '\t' | '\r' => out.push(ch),
                c if c.is_control() => out.push('\u{FFFD}'),
                c => out.push(c),
            }
            continue;
        }

        match chars.peek().copied() {
            // CSI: ESC [ params <final byte in @..~>
            Some('[') => {
                chars.next();
                for c in chars.by_ref() {
                    if ('@'..='~').contains(&c) {
                        break;
                    }
                }
                out.push_str("[CSI]");
            }
            // OSC: ESC ] ... terminated by BEL or ESC \
            Some(']') => {
                chars.next();
                while let Some(c) = chars.next() {
                    if c == '\x07' {
                        break;
                    }
                    if c == '\x1b' && chars.peek() == Some(&'\\') {
                        chars.next();
                        break;
                    }
                }
                out.push_str("[OSC]");
            }
            Some(_) => {
                chars.next();
                out.push_str("[ESC]");
            }
            None => out.push_str("[ESC]"),
        }
    }

    out
}
