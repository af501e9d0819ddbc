//! Shader script text: Latin-1 decoding, removal of generated blocks, regeneration, and a small
//! nom parser used to check the result.

use anyhow::{bail, Result};
use nom::branch::alt;
use nom::bytes::complete::{tag, take_until};
use nom::character::complete::{char, none_of, satisfy};
use nom::combinator::{all_consuming, recognize};
use nom::multi::{many0, many1};
use nom::sequence::{delimited, preceded, terminated, tuple};
use nom::{IResult, Parser};

pub fn decode_latin1(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| b as char).collect()
}

/// Characters outside Latin-1 become `?`.
pub fn encode_latin1(text: &str) -> Vec<u8> {
    text.chars()
        .map(|c| u8::try_from(u32::from(c)).unwrap_or(b'?'))
        .collect()
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum StripState {
    Copy,
    Skipping {
        depth: i32,
        opened: bool,
        in_comment: bool,
    },
    /// A removed block just closed; one blank line right after it goes with it.
    TrailingBlank,
}

fn code_part(line: &str) -> &str {
    match line.find("//") {
        Some(pos) => &line[..pos],
        None => line,
    }
}

fn is_target(line: &str, names: &[String]) -> bool {
    match code_part(line).split_whitespace().next() {
        Some(first) => names.iter().any(|name| first.eq_ignore_ascii_case(name)),
        None => false,
    }
}

/// Advances a skipping state over the braces of one line. Braces inside comments and quoted
/// tokens don't count.
fn skip_line(line: &str, mut depth: i32, mut opened: bool, mut in_comment: bool) -> StripState {
    let mut chars = line.chars().peekable();
    while let Some(c) = chars.next() {
        if in_comment {
            if c == '*' && chars.peek() == Some(&'/') {
                chars.next();
                in_comment = false;
            }
            continue;
        }
        match c {
            '/' if chars.peek() == Some(&'/') => break,
            '/' if chars.peek() == Some(&'*') => {
                chars.next();
                in_comment = true;
            }
            '"' => {
                for quoted in chars.by_ref() {
                    if quoted == '"' {
                        break;
                    }
                }
            }
            '{' => {
                depth += 1;
                opened = true;
            }
            '}' => depth -= 1,
            _ => (),
        }
    }
    if opened && depth <= 0 {
        StripState::TrailingBlank
    } else {
        StripState::Skipping {
            depth,
            opened,
            in_comment,
        }
    }
}

/// Removes every block whose header names one of `names` (case-insensitively), together with a
/// single blank line directly after it. All other lines are kept verbatim.
pub fn strip_blocks<'a>(lines: impl IntoIterator<Item = &'a str>, names: &[String]) -> Vec<String> {
    let mut out = Vec::new();
    let mut state = StripState::Copy;
    for line in lines {
        state = match state {
            StripState::TrailingBlank if line.trim().is_empty() => StripState::Copy,
            StripState::Copy | StripState::TrailingBlank => {
                if is_target(line, names) {
                    skip_line(line, 0, false, false)
                } else {
                    out.push(line.to_string());
                    StripState::Copy
                }
            }
            StripState::Skipping {
                depth,
                opened,
                in_comment,
            } => skip_line(line, depth, opened, in_comment),
        };
    }
    out
}

/// A shader that disables mipmapping for every image in `images`.
pub fn nomip_block(name: &str, images: &[String]) -> Vec<String> {
    let mut lines = vec![name.to_string(), "{".to_string(), "\tnomipmaps".to_string()];
    for image in images {
        lines.push("\t{".to_string());
        lines.push(format!("\t\tmap {}", image));
        lines.push("\t}".to_string());
    }
    lines.push("}".to_string());
    lines.push(String::new());
    lines
}

pub const IMAGES_PER_BLOCK: usize = 8;

/// Replaces the blocks called `names` in `text` with fresh ones covering `images`, eight per
/// block in order.
pub fn patch_script(text: &str, names: &[String], images: &[String]) -> Vec<String> {
    let mut lines = strip_blocks(text.lines(), names);
    for (name, chunk) in names.iter().zip(images.chunks(IMAGES_PER_BLOCK)) {
        lines.extend(nomip_block(name, chunk));
    }
    lines
}

#[derive(Debug, PartialEq, Eq)]
pub enum Entry<'a> {
    Token(&'a str),
    Group(Vec<Entry<'a>>),
}

#[derive(Debug, PartialEq, Eq)]
pub struct ShaderBlock<'a> {
    pub name: &'a str,
    pub entries: Vec<Entry<'a>>,
}

impl<'a> ShaderBlock<'a> {
    /// Every image referenced by a `map` directive in the stages of this block.
    pub fn map_paths(&self) -> Vec<&'a str> {
        fn walk<'a>(entries: &[Entry<'a>], out: &mut Vec<&'a str>) {
            let mut previous_was_map = false;
            for entry in entries {
                match entry {
                    Entry::Token(token) => {
                        if previous_was_map {
                            out.push(*token);
                        }
                        previous_was_map = token.eq_ignore_ascii_case("map");
                    }
                    Entry::Group(group) => {
                        previous_was_map = false;
                        walk(group, out);
                    }
                }
            }
        }

        let mut out = Vec::new();
        walk(&self.entries, &mut out);
        out
    }
}

fn whitespace_char(input: &str) -> IResult<&str, char> {
    satisfy(|c| c.is_whitespace())(input)
}

fn line_comment(input: &str) -> IResult<&str, &str> {
    recognize(tuple((tag("//"), many0(none_of("\r\n")))))(input)
}

fn block_comment(input: &str) -> IResult<&str, &str> {
    recognize(tuple((tag("/*"), take_until("*/"), tag("*/"))))(input)
}

fn whitespace0(input: &str) -> IResult<&str, &str> {
    recognize(many0(alt((
        recognize(whitespace_char),
        line_comment,
        block_comment,
    ))))(input)
}

fn token(input: &str) -> IResult<&str, &str> {
    preceded(
        whitespace0,
        alt((
            delimited(char('"'), recognize(many0(none_of("\""))), char('"')),
            recognize(many1(satisfy(|c| {
                !c.is_whitespace() && c != '{' && c != '}'
            }))),
        )),
    )(input)
}

fn operator(c: char) -> impl Fn(&str) -> IResult<&str, char> {
    move |input| preceded(whitespace0, char(c))(input)
}

fn entry(input: &str) -> IResult<&str, Entry> {
    alt((
        token.map(Entry::Token),
        delimited(operator('{'), many0(entry), operator('}')).map(Entry::Group),
    ))(input)
}

fn block(input: &str) -> IResult<&str, ShaderBlock> {
    let (input, name) = token(input)?;
    let (input, entries) = delimited(operator('{'), many0(entry), operator('}'))(input)?;
    Ok((input, ShaderBlock { name, entries }))
}

/// Parses a whole shader script.
pub fn parse_blocks(text: &str) -> Result<Vec<ShaderBlock>> {
    match all_consuming(terminated(many0(block), whitespace0))(text) {
        Ok((_, blocks)) => Ok(blocks),
        Err(nom::Err::Error(e)) | Err(nom::Err::Failure(e)) => {
            let consumed = &text[..text.len() - e.input.len()];
            bail!(
                "shader script syntax error on line {}",
                consumed.matches('\n').count() + 1,
            )
        }
        Err(nom::Err::Incomplete(_)) => bail!("shader script ends unexpectedly"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(names: &[&str]) -> Vec<String> {
        names.iter().map(|name| name.to_string()).collect()
    }

    fn to_text(lines: &[String]) -> String {
        lines.iter().map(|line| format!("{}\n", line)).collect()
    }

    #[test]
    fn latin1() {
        assert_eq!(decode_latin1(b"caf\xe9"), "caf\u{e9}");
        assert_eq!(encode_latin1("caf\u{e9}"), b"caf\xe9");
        assert_eq!(encode_latin1("\u{20ac}"), b"?");
    }

    #[test]
    fn replaces_previous_block() {
        let text = "mapname/force_nomip_0\n{\n\tnomipmaps\n\t{\n\t\tmap a.tga\n\t}\n}\n\n";
        let patched = patch_script(text, &names(&["mapname/force_nomip_0"]), &names(&["b.tga"]));
        let patched = to_text(&patched);
        assert!(!patched.contains("a.tga"));
        assert_eq!(
            patched,
            "mapname/force_nomip_0\n{\n\tnomipmaps\n\t{\n\t\tmap b.tga\n\t}\n}\n\n",
        );
    }

    #[test]
    fn replaces_single_line_block() {
        let text = "mapname/force_nomip_0 { nomipmaps { map a.tga } }\n\ntextures/x\n{\n}\n";
        let patched = patch_script(text, &names(&["mapname/force_nomip_0"]), &names(&["b.tga"]));
        let patched = to_text(&patched);
        assert!(!patched.contains("a.tga"));
        assert!(patched.starts_with("textures/x\n{\n}\nmapname/force_nomip_0\n"));
        assert!(patched.contains("\t\tmap b.tga\n"));
    }

    #[test]
    fn keeps_unrelated_text() {
        let text = "// header\ntextures/base/wall\n{\n\t{\n\t\tmap $lightmap\n\t}\n}\n\n\
                    MAPNAME/FORCE_NOMIP_1\n{\n\t{\n\t\tmap old.tga\n\t}\n}\n\n\nlast\n{\n}\n";
        let stripped = strip_blocks(text.lines(), &names(&["mapname/force_nomip_1"]));
        assert_eq!(
            to_text(&stripped),
            "// header\ntextures/base/wall\n{\n\t{\n\t\tmap $lightmap\n\t}\n}\n\n\nlast\n{\n}\n",
        );
    }

    #[test]
    fn back_to_back_blocks() {
        let text = "a/force_nomip_0\n{\n}\na/force_nomip_1\n{\n}\n\nkeep\n";
        let stripped = strip_blocks(text.lines(), &names(&["a/force_nomip_0", "a/force_nomip_1"]));
        assert_eq!(stripped, names(&["keep"]));
    }

    #[test]
    fn unterminated_block_is_dropped() {
        let stripped = strip_blocks("keep\nx\n{\n\tnomipmaps\n".lines(), &names(&["x"]));
        assert_eq!(stripped, names(&["keep"]));
    }

    #[test]
    fn braces_in_comments_and_quotes_are_ignored() {
        let text = "x\n{\n\t/* old { stage\n\t} */\n\tmap \"a{.tga\" // }\n}\n\n\
                    textures/keep\n{\n}\n";
        let stripped = strip_blocks(text.lines(), &names(&["x"]));
        assert_eq!(stripped, names(&["textures/keep", "{", "}"]));
    }

    #[test]
    fn blocks_of_eight() {
        let images: Vec<String> = (0..9).map(|i| format!("maps/m/lm_{:04}.tga", i)).collect();
        let patched = patch_script("", &names(&["m/force_nomip_0", "m/force_nomip_1"]), &images);
        let text = to_text(&patched);
        let blocks = parse_blocks(&text).unwrap();
        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[0].map_paths(), &images[..8]);
        assert_eq!(blocks[1].map_paths(), &images[8..]);
        assert_eq!(blocks[1].entries[0], Entry::Token("nomipmaps"));
    }

    #[quickcheck]
    fn patching_is_idempotent(prefix: Vec<u8>, image_count: u8) -> bool {
        let prefix: String = prefix
            .into_iter()
            .map(|b| match b % 6 {
                0 => '\n',
                1 => '{',
                2 => '}',
                3 => ' ',
                _ => 'x',
            })
            .collect();
        let images: Vec<String> = (0..image_count % 20)
            .map(|i| format!("maps/q/lm_{:04}.tga", i))
            .collect();
        let block_names: Vec<String> = (0..(images.len() + 7) / 8)
            .map(|i| format!("q/force_nomip_{}", i))
            .collect();
        let once = to_text(&patch_script(&prefix, &block_names, &images));
        let twice = to_text(&patch_script(&once, &block_names, &images));
        once == twice
    }

    #[test]
    fn parser() {
        let text = "/* generated */\ntextures/a // trailing\n{\n\tsurfaceparm nolightmap\n\t\
                    {\n\t\tmap \"textures/a b.tga\"\n\t\tblendFunc GL_ONE GL_ZERO\n\t}\n}\n";
        let blocks = parse_blocks(text).unwrap();
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].name, "textures/a");
        assert_eq!(blocks[0].map_paths(), ["textures/a b.tga"]);
        assert_eq!(
            blocks[0].entries[..2],
            [Entry::Token("surfaceparm"), Entry::Token("nolightmap")],
        );
    }

    #[test]
    fn parser_reports_line() {
        let err = parse_blocks("a\n{\n}\nb\n{\n{\n").unwrap_err();
        assert_eq!(err.to_string(), "shader script syntax error on line 4");
    }
}
