//! Question extraction for the QA@CLEF topic file.
//!
//! The topic file is ordinary well-formed XML:
//!
//! ```text
//! <qa>
//!   <pergunta id="0001">
//!     <texto>Quem escreveu Os Lusíadas?</texto>
//!   </pergunta>
//! </qa>
//! ```
//!
//! Each `/qa/pergunta/texto` element becomes one line of plain text.

use std::{
    io::{BufRead, BufReader, Write},
    path::Path,
};

use quick_xml::{events::Event, reader::Reader};

use crate::error::{Error, Result};

/// Fixed input file name, relative to the working directory.
pub const DEFAULT_INPUT: &str = "qaclef_pt.xml";

/// Fixed output location, relative to the working directory.
pub const DEFAULT_OUTPUT: &str = "docs/qa.txt";

/// Element path selected from the document root.
const QUESTION_PATH: [&[u8]; 3] = [b"qa", b"pergunta", b"texto"];

/// Read the questions from the XML file at `path`.
pub fn extract_file(path: &Path) -> Result<Vec<String>> {
    let file = std::fs::File::open(path)?;
    extract(BufReader::new(file))
}

/// Collect the trimmed text of every `/qa/pergunta/texto` element, in
/// document order.
pub fn extract<R: BufRead>(input: R) -> Result<Vec<String>> {
    let mut reader = Reader::from_reader(input);
    let mut buf = Vec::new();

    let mut stack: Vec<Vec<u8>> = Vec::new();
    let mut roots = 0usize;
    let mut capture: Option<(usize, String)> = None;
    let mut questions = Vec::new();

    loop {
        buf.clear();
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) => {
                if stack.is_empty() {
                    roots += 1;
                    if roots > 1 {
                        return Err(Error::MalformedXml(
                            "more than one root element".into(),
                        ));
                    }
                }
                stack.push(e.name().as_ref().to_vec());
                if capture.is_none() && on_question_path(&stack) {
                    capture = Some((stack.len(), String::new()));
                }
            }
            Event::Empty(e) => {
                if stack.is_empty() {
                    roots += 1;
                    if roots > 1 {
                        return Err(Error::MalformedXml(
                            "more than one root element".into(),
                        ));
                    }
                }
                stack.push(e.name().as_ref().to_vec());
                if capture.is_none() && on_question_path(&stack) {
                    questions.push(String::new());
                }
                stack.pop();
            }
            Event::Text(e) => {
                let text = e.unescape()?;
                if stack.is_empty() && !text.trim().is_empty() {
                    return Err(Error::MalformedXml(
                        "text outside the root element".into(),
                    ));
                }
                if let Some((_, captured)) = capture.as_mut() {
                    captured.push_str(&text);
                }
            }
            Event::CData(e) => {
                if let Some((_, captured)) = capture.as_mut() {
                    let text = std::str::from_utf8(&e).map_err(|_| {
                        Error::MalformedXml("CDATA is not valid UTF-8".into())
                    })?;
                    captured.push_str(text);
                }
            }
            Event::End(_) => {
                if capture
                    .as_ref()
                    .is_some_and(|(depth, _)| *depth == stack.len())
                    && let Some((_, text)) = capture.take()
                {
                    questions.push(text.trim().to_string());
                }
                stack.pop();
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if !stack.is_empty() {
        return Err(Error::MalformedXml(format!(
            "unclosed element <{}>",
            String::from_utf8_lossy(&stack[stack.len() - 1])
        )));
    }
    if roots == 0 {
        return Err(Error::MalformedXml("no root element".into()));
    }

    tracing::debug!(count = questions.len(), "extracted questions");
    Ok(questions)
}

fn on_question_path(stack: &[Vec<u8>]) -> bool {
    stack.len() == QUESTION_PATH.len()
        && stack
            .iter()
            .zip(QUESTION_PATH)
            .all(|(name, expected)| name.as_slice() == expected)
}

/// Write one question per line, creating the parent directory if needed.
pub fn write_lines(path: &Path, questions: &[String]) -> Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)?;
    }
    let mut out = std::io::BufWriter::new(std::fs::File::create(path)?);
    for question in questions {
        writeln!(out, "{question}")?;
    }
    out.flush()?;
    Ok(())
}

/// Extract questions from `input` and write them to `output`.
pub fn convert(input: &Path, output: &Path) -> Result<usize> {
    let questions = extract_file(input)?;
    write_lines(output, &questions)?;
    tracing::info!(
        count = questions.len(),
        output = %output.display(),
        "wrote questions"
    );
    Ok(questions.len())
}
