//! Stateless text normalization: BOM stripping, line-ending folding, trailing
//! whitespace trimming (preserving markdown table pipes), blank-line collapse.
//!
//! `normalize(normalize(t)) == normalize(t)` — every transform here is a
//! fixed point of itself.

#[derive(Debug, Clone)]
pub struct NormalizeOptions {
    pub strip_bom: bool,
    pub line_ending: LineEnding,
    pub trim_trailing_whitespace: bool,
    pub collapse_blank_lines: bool,
}

impl Default for NormalizeOptions {
    fn default() -> Self {
        Self {
            strip_bom: true,
            line_ending: LineEnding::Lf,
            trim_trailing_whitespace: true,
            collapse_blank_lines: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineEnding {
    Lf,
    CrLf,
}

#[derive(Debug, Clone, Default)]
pub struct NormalizeReport {
    pub stripped_bom: bool,
    pub folded_line_endings: bool,
    pub trimmed_trailing_whitespace: bool,
    pub collapsed_blank_lines: bool,
}

pub fn normalize(text: &str, opts: &NormalizeOptions) -> (String, NormalizeReport) {
    let mut report = NormalizeReport::default();
    let mut working = text;

    if opts.strip_bom {
        if let Some(stripped) = working.strip_prefix('\u{feff}') {
            working = stripped;
            report.stripped_bom = true;
        }
    }

    let folded = fold_line_endings(working, opts.line_ending);
    if folded != working {
        report.folded_line_endings = true;
    }
    let mut result = folded;

    if opts.trim_trailing_whitespace {
        let trimmed = trim_trailing_whitespace_per_line(&result, opts.line_ending);
        if trimmed != result {
            report.trimmed_trailing_whitespace = true;
        }
        result = trimmed;
    }

    if opts.collapse_blank_lines {
        let collapsed = collapse_blank_lines(&result, opts.line_ending);
        if collapsed != result {
            report.collapsed_blank_lines = true;
        }
        result = collapsed;
    }

    (result, report)
}

fn fold_line_endings(text: &str, ending: LineEnding) -> String {
    let normalized_to_lf = text.replace("\r\n", "\n").replace('\r', "\n");
    match ending {
        LineEnding::Lf => normalized_to_lf,
        LineEnding::CrLf => normalized_to_lf.replace('\n', "\r\n"),
    }
}

fn line_sep(ending: LineEnding) -> &'static str {
    match ending {
        LineEnding::Lf => "\n",
        LineEnding::CrLf => "\r\n",
    }
}

/// Trims trailing whitespace on each line, except lines that look like a
/// markdown table row (contain a `|`), where a single trailing space is kept
/// so the table's cell separator is not disturbed.
fn trim_trailing_whitespace_per_line(text: &str, ending: LineEnding) -> String {
    let sep = line_sep(ending);
    let lines: Vec<&str> = text.split(sep).collect();
    let processed: Vec<String> = lines
        .iter()
        .map(|line| {
            let trimmed = line.trim_end();
            if trimmed.contains('|') && trimmed.len() < line.len() {
                format!("{trimmed} ")
            } else {
                trimmed.to_string()
            }
        })
        .collect();
    processed.join(sep)
}

/// Collapses 3 or more consecutive blank lines down to 2.
fn collapse_blank_lines(text: &str, ending: LineEnding) -> String {
    let sep = line_sep(ending);
    let lines: Vec<&str> = text.split(sep).collect();
    let mut out: Vec<&str> = Vec::with_capacity(lines.len());
    let mut blank_run = 0;
    for line in lines {
        if line.is_empty() {
            blank_run += 1;
            if blank_run <= 2 {
                out.push(line);
            }
        } else {
            blank_run = 0;
            out.push(line);
        }
    }
    out.join(sep)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_bom() {
        let (result, report) = normalize("\u{feff}hello", &NormalizeOptions::default());
        assert_eq!(result, "hello");
        assert!(report.stripped_bom);
    }

    #[test]
    fn folds_crlf_to_lf_by_default() {
        let (result, report) = normalize("a\r\nb\r\n", &NormalizeOptions::default());
        assert_eq!(result, "a\nb\n");
        assert!(report.folded_line_endings);
    }

    #[test]
    fn trims_trailing_whitespace_but_keeps_table_pipe_spacing() {
        let (result, _) = normalize("plain   \n| a | b |  \n", &NormalizeOptions::default());
        assert_eq!(result, "plain\n| a | b | \n");
    }

    #[test]
    fn collapses_three_or_more_blank_lines_to_two() {
        let (result, report) = normalize("a\n\n\n\n\nb\n", &NormalizeOptions::default());
        assert_eq!(result, "a\n\n\nb\n");
        assert!(report.collapsed_blank_lines);
    }

    #[test]
    fn is_idempotent() {
        let opts = NormalizeOptions::default();
        let input = "\u{feff}a  \r\n\r\n\r\n\r\nb\r\n";
        let (once, _) = normalize(input, &opts);
        let (twice, _) = normalize(&once, &opts);
        assert_eq!(once, twice);
    }
}
