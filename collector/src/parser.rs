//! # CSV Stats Parser
//!
//! Reads the comma-separated output of HAProxy's `;csv` stats page or
//! `show stat` socket command.
//!
//! The first non-blank line is the header. Its column set differs between HAProxy
//! releases, so columns are looked up by name through a table built once per
//! scrape. Rows are produced lazily; a row that cannot be interpreted is counted
//! and skipped without affecting the rows after it.

use crate::fields::EntityKind;
use std::{
    borrow::Cow,
    collections::HashMap,
    iter::Enumerate,
    str::Lines,
};

/// The stats output cannot be interpreted at all.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("no header line in stats output")]
    MissingHeader,
    #[error("stats header has no {0:?} column")]
    MissingColumn(&'static str),
}

/// A single row that was skipped.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum RowWarning {
    #[error("line {line}: {found} fields but the header has {expected}")]
    TooManyFields { line: usize, found: usize, expected: usize },
    #[error("line {line}: missing proxy or service name")]
    MissingName { line: usize },
    #[error("line {line}: unknown entity type {value:?}")]
    UnknownType { line: usize, value: String },
}

/// Column name to position table for one scrape.
#[derive(Debug, Clone)]
pub struct Header<'a> {
    columns: Vec<Cow<'a, str>>,
    index: HashMap<Cow<'a, str>, usize>,
    pxname: usize,
    svname: usize,
    kind: Option<usize>,
}

impl<'a> Header<'a> {
    fn parse(line: &'a str) -> Result<Self, ParseError> {
        let line = line.trim();
        let line = line.strip_prefix('#').unwrap_or(line);
        let columns: Vec<Cow<'a, str>> = split_fields(line).into_iter().map(trim).collect();

        let mut index = HashMap::with_capacity(columns.len());
        for (position, column) in columns.iter().enumerate() {
            index.entry(column.clone()).or_insert(position);
        }

        let required = |name: &'static str| index.get(name).copied().ok_or(ParseError::MissingColumn(name));
        let pxname = required("pxname")?;
        let svname = required("svname")?;
        let kind = index.get("type").copied();

        Ok(Self {
            columns,
            index,
            pxname,
            svname,
            kind,
        })
    }

    pub fn position(&self, column: &str) -> Option<usize> {
        self.index.get(column).copied()
    }

    pub fn columns(&self) -> &[Cow<'a, str>] {
        &self.columns
    }

    pub fn width(&self) -> usize {
        self.columns.len()
    }

    fn row<'r>(&'r self, line: &'r str, number: usize) -> Result<StatRow<'r>, RowWarning> {
        let fields: Vec<Cow<'r, str>> = split_fields(line).into_iter().map(trim).collect();
        if fields.len() > self.width() {
            return Err(RowWarning::TooManyFields {
                line: number,
                found: fields.len(),
                expected: self.width(),
            });
        }

        let value = |position: usize| fields.get(position).map(|value| &**value).unwrap_or_default();
        if value(self.pxname).is_empty() || value(self.svname).is_empty() {
            return Err(RowWarning::MissingName { line: number });
        }

        let kind = match self.kind.map(value).filter(|code| !code.is_empty()) {
            Some(code) => EntityKind::from_type_code(code).ok_or_else(|| RowWarning::UnknownType {
                line: number,
                value: code.to_string(),
            })?,
            None => EntityKind::from_service_name(value(self.svname)),
        };

        Ok(StatRow {
            kind,
            fields,
            header: self,
        })
    }
}

/// One frontend, backend, server or listener line.
///
/// Rows shorter than the header read as if padded with empty values.
#[derive(Debug, Clone)]
pub struct StatRow<'a> {
    kind: EntityKind,
    fields: Vec<Cow<'a, str>>,
    header: &'a Header<'a>,
}

impl StatRow<'_> {
    pub fn kind(&self) -> EntityKind {
        self.kind
    }

    pub fn proxy(&self) -> &str {
        &self.fields[self.header.pxname]
    }

    pub fn instance(&self) -> &str {
        &self.fields[self.header.svname]
    }

    /// Value at a header position, `None` when empty or past the end of a short row.
    pub fn field(&self, position: usize) -> Option<&str> {
        self.fields
            .get(position)
            .map(|value| &**value)
            .filter(|value| !value.is_empty())
    }

    pub fn get(&self, column: &str) -> Option<&str> {
        self.header.position(column).and_then(|position| self.field(position))
    }
}

/// Parsed header plus the not yet interpreted data lines.
#[derive(Debug, Clone)]
pub struct StatsTable<'a> {
    header: Header<'a>,
    body: Enumerate<Lines<'a>>,
}

/// Parse stats output. Only the header is interpreted up front; see [`StatsTable::rows`].
pub fn parse(text: &str) -> Result<StatsTable<'_>, ParseError> {
    let mut lines = text.lines().enumerate();
    let (_, header) = lines
        .by_ref()
        .find(|(_, line)| !line.trim().is_empty())
        .ok_or(ParseError::MissingHeader)?;
    Ok(StatsTable {
        header: Header::parse(header)?,
        body: lines,
    })
}

impl<'a> StatsTable<'a> {
    pub fn header(&self) -> &Header<'a> {
        &self.header
    }

    /// A fresh pass over the data rows.
    pub fn rows(&self) -> Rows<'_, 'a> {
        Rows {
            header: &self.header,
            lines: self.body.clone(),
            warnings: 0,
        }
    }
}

/// `'t` borrows the table, `'a` is the stats text.
pub struct Rows<'t, 'a> {
    header: &'t Header<'a>,
    lines: Enumerate<Lines<'a>>,
    warnings: usize,
}

impl Rows<'_, '_> {
    /// Rows skipped so far.
    pub fn warnings(&self) -> usize {
        self.warnings
    }
}

impl<'t, 'a: 't> Iterator for Rows<'t, 'a> {
    type Item = StatRow<'t>;

    fn next(&mut self) -> Option<Self::Item> {
        for (index, line) in self.lines.by_ref() {
            let line = line.trim_end_matches('\r');
            let trimmed = line.trim_start();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }
            match self.header.row(line, index + 1) {
                Ok(row) => return Some(row),
                Err(warning) => {
                    debug!(%warning, "skipping malformed stats row");
                    self.warnings += 1;
                }
            }
        }
        None
    }
}

/// Best-effort numeric value. Empty, non-numeric and non-finite input is absent.
pub fn parse_number(raw: &str) -> Option<f64> {
    let raw = raw.trim();
    if let Ok(value) = raw.parse::<i64>() {
        return Some(value as f64);
    }
    raw.parse::<f64>().ok().filter(|value| value.is_finite())
}

fn trim(value: Cow<'_, str>) -> Cow<'_, str> {
    match value {
        Cow::Borrowed(value) => Cow::Borrowed(value.trim()),
        Cow::Owned(value) => Cow::Owned(value.trim().to_string()),
    }
}

/// Split a line on the commas outside double quotes.
///
/// HAProxy quotes values holding a comma or a quote (check and agent
/// descriptions, cookies) and doubles embedded quotes. It also ends every line
/// with a comma; that one is not a column.
fn split_fields(line: &str) -> Vec<Cow<'_, str>> {
    let mut fields = Vec::new();
    let mut rest = line.trim_end_matches('\r');
    loop {
        let (field, remainder) = next_field(rest);
        fields.push(field);
        match remainder {
            Some("") | None => break,
            Some(remainder) => rest = remainder,
        }
    }
    fields
}

/// The first field of `input` and what follows its separator, if there is one.
fn next_field(input: &str) -> (Cow<'_, str>, Option<&str>) {
    let Some(mut rest) = input.strip_prefix('"') else {
        return match input.split_once(',') {
            Some((field, remainder)) => (Cow::Borrowed(field), Some(remainder)),
            None => (Cow::Borrowed(input), None),
        };
    };

    let mut unescaped: Option<String> = None;
    loop {
        let Some(end) = rest.find('"') else {
            // Unterminated quote: the rest of the line is the value.
            return (join(unescaped, rest), None);
        };
        let after = &rest[end + 1..];
        if let Some(next) = after.strip_prefix('"') {
            unescaped.get_or_insert_with(String::new).push_str(&rest[..=end]);
            rest = next;
            continue;
        }
        let field = join(unescaped, &rest[..end]);
        return match after.split_once(',') {
            Some((_, remainder)) => (field, Some(remainder)),
            None => (field, None),
        };
    }
}

fn join(prefix: Option<String>, tail: &str) -> Cow<'_, str> {
    match prefix {
        Some(mut value) => {
            value.push_str(tail);
            Cow::Owned(value)
        }
        None => Cow::Borrowed(tail),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const HAPROXY_15: &str = "\
# pxname,svname,qcur,qmax,scur,smax,slim,stot,bin,bout,dreq,dresp,ereq,econ,eresp,wretr,wredis,status,weight,act,bck,chkfail,chkdown,lastchg,downtime,qlimit,pid,iid,sid,throttle,lbtot,tracked,type,rate,rate_lim,rate_max,check_status,check_code,check_duration,hrsp_1xx,hrsp_2xx,hrsp_3xx,hrsp_4xx,hrsp_5xx,hrsp_other,hanafail,req_rate,req_rate_max,req_tot,cli_abrt,srv_abrt,
http-in,FRONTEND,,,1,12,2000,4567,100,200,0,0,3,,,,,OPEN,,,,,,,,,1,2,0,,,,0,1,0,9,,,,0,10,0,2,0,0,,1,9,12,,,
app,web1,0,2,1,5,,230,50,80,,0,,0,0,0,0,UP,1,1,0,0,0,3600,0,,1,3,1,,230,,2,0,,4,L4OK,,1,0,200,0,0,0,0,0,,,,0,0,
app,BACKEND,0,2,1,5,200,230,50,80,0,0,,0,0,0,0,UP,1,1,0,,0,3600,0,,1,3,0,,230,,1,0,,4,,,,0,200,0,0,0,0,,,,,0,0,
";

    fn kinds(table: &StatsTable<'_>) -> Vec<(EntityKind, String, String)> {
        table
            .rows()
            .map(|row| (row.kind(), row.proxy().to_string(), row.instance().to_string()))
            .collect()
    }

    #[test]
    fn parses_haproxy_output() {
        let table = parse(HAPROXY_15).unwrap();
        assert_eq!(table.header().position("pxname"), Some(0));
        assert_eq!(table.header().position("type"), Some(32));
        assert_eq!(table.header().width(), 51);
        assert_eq!(
            kinds(&table),
            vec![
                (EntityKind::Frontend, "http-in".to_string(), "FRONTEND".to_string()),
                (EntityKind::Server, "app".to_string(), "web1".to_string()),
                (EntityKind::Backend, "app".to_string(), "BACKEND".to_string()),
            ]
        );

        let server = table.rows().nth(1).unwrap();
        assert_eq!(server.get("status"), Some("UP"));
        assert_eq!(server.get("check_status"), Some("L4OK"));
        assert_eq!(server.get("slim"), None);
        assert_eq!(server.get("no_such_column"), None);
    }

    #[test]
    fn columns_are_resolved_by_name() {
        let a = parse("pxname,svname,scur,qcur\nb,s1,7,3\n").unwrap();
        let b = parse("qcur,svname,pxname,scur\n3,s1,b,7\n").unwrap();
        let row_a = a.rows().next().unwrap();
        let row_b = b.rows().next().unwrap();
        for column in ["pxname", "svname", "scur", "qcur"] {
            assert_eq!(row_a.get(column), row_b.get(column));
        }
    }

    #[test]
    fn short_rows_are_padded() {
        let table = parse("pxname,svname,qcur,scur,status\nb,s1,4\n").unwrap();
        let mut rows = table.rows();
        let row = rows.next().unwrap();
        assert_eq!(row.get("qcur"), Some("4"));
        assert_eq!(row.get("scur"), None);
        assert_eq!(row.get("status"), None);
        assert!(rows.next().is_none());
        assert_eq!(rows.warnings(), 0);
    }

    #[test]
    fn malformed_rows_are_skipped_and_counted() {
        let text = "\
pxname,svname,qcur,scur
a,s1,0,1
garbage
a,s2,0,1,9,9
a,s3,0,1
,s4,0,1
a,s5,0,1
";
        let table = parse(text).unwrap();
        let mut rows = table.rows();
        let names: Vec<_> = rows.by_ref().map(|row| row.instance().to_string()).collect();
        assert_eq!(names, vec!["s1", "s3", "s5"]);
        assert_eq!(rows.warnings(), 3);
    }

    #[test]
    fn unknown_type_code_is_a_warning() {
        let table = parse("pxname,svname,type\na,s1,2\na,s2,9\na,FRONTEND,\n").unwrap();
        let mut rows = table.rows();
        let found: Vec<_> = rows.by_ref().map(|row| row.kind()).collect();
        assert_eq!(found, vec![EntityKind::Server, EntityKind::Frontend]);
        assert_eq!(rows.warnings(), 1);
    }

    #[test]
    fn listener_rows_use_type_column() {
        let table = parse("# pxname,svname,scur,type,\nstats,sock-1,0,3,\n").unwrap();
        let row = table.rows().next().unwrap();
        assert_eq!(row.kind(), EntityKind::Listener);
        assert_eq!(row.instance(), "sock-1");
    }

    #[test]
    fn blank_lines_comments_and_crlf_are_tolerated() {
        let text = "\r\n\r\n# pxname,svname,scur,\r\n\r\n# a comment\r\nfe,FRONTEND,5,\r\n";
        let table = parse(text).unwrap();
        let mut rows = table.rows();
        let row = rows.next().unwrap();
        assert_eq!(row.kind(), EntityKind::Frontend);
        assert_eq!(row.get("scur"), Some("5"));
        assert!(rows.next().is_none());
        assert_eq!(rows.warnings(), 0);
    }

    #[test]
    fn quoted_values_may_contain_commas() {
        let text = "# pxname,svname,scur,last_chk,\napp,web1,3,\"Layer7 wrong status, code: 503\",\napp,web2,4,L4OK,\n";
        let table = parse(text).unwrap();
        let mut rows = table.rows();
        let found: Vec<_> = rows
            .by_ref()
            .map(|row| (row.instance().to_string(), row.get("scur").map(str::to_string), row.get("last_chk").map(str::to_string)))
            .collect();
        assert_eq!(
            found,
            vec![
                (
                    "web1".to_string(),
                    Some("3".to_string()),
                    Some("Layer7 wrong status, code: 503".to_string())
                ),
                ("web2".to_string(), Some("4".to_string()), Some("L4OK".to_string())),
            ]
        );
        assert_eq!(rows.warnings(), 0);
    }

    #[test]
    fn field_splitting() {
        let split = |line| split_fields(line).into_iter().map(Cow::into_owned).collect::<Vec<_>>();
        assert_eq!(split("a,b,"), vec!["a", "b"]);
        assert_eq!(split("a,,"), vec!["a", ""]);
        assert_eq!(split(""), vec![""]);
        assert_eq!(split("a,\"say \"\"hi\"\", ok\",c,"), vec!["a", "say \"hi\", ok", "c"]);
        assert_eq!(split("a,\"\""), vec!["a", ""]);
        assert_eq!(split("a,\"open, ended"), vec!["a", "open, ended"]);
    }

    #[test]
    fn rows_can_be_read_again() {
        let table = parse(HAPROXY_15).unwrap();
        assert_eq!(table.rows().count(), 3);
        assert_eq!(table.rows().count(), 3);
    }

    #[test]
    fn total_failures() {
        assert_eq!(parse("").unwrap_err(), ParseError::MissingHeader);
        assert_eq!(parse("\n  \n").unwrap_err(), ParseError::MissingHeader);
        assert_eq!(
            parse("<html>Not Found</html>").unwrap_err(),
            ParseError::MissingColumn("pxname")
        );
        assert_eq!(parse("pxname,scur\n").unwrap_err(), ParseError::MissingColumn("svname"));
    }

    #[test]
    fn numbers_are_best_effort() {
        assert_eq!(parse_number("42"), Some(42.0));
        assert_eq!(parse_number(" 0 "), Some(0.0));
        assert_eq!(parse_number("0.25"), Some(0.25));
        assert_eq!(parse_number("-3"), Some(-3.0));
        assert_eq!(parse_number(""), None);
        assert_eq!(parse_number("UP"), None);
        assert_eq!(parse_number("NaN"), None);
        assert_eq!(parse_number("inf"), None);
    }
}
