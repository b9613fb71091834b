//! Query Parser
//!
//! Parses the restricted declarative query language into a [`ParsedQuery`].
//!
//! # Grammar
//!
//! ```text
//! query    := SELECT [TOP n] columns FROM table [WHERE conds]
//!             [GROUP BY ident {, ident}] [HAVING conds]
//!             [ORDER BY order {, order}] [LIMIT n] [;]
//! columns  := '*' | column {, column}
//! column   := ident ['(' (ident|'*') ')'] [AS ident]
//! order    := ident [ASC|DESC]
//! conds    := cond {(AND|OR) cond}
//! cond     := '(' conds ')'
//!           | tscol (>=|>) (string | date_sub)
//!           | tscol (<=|<) string
//!           | tscol BETWEEN string AND string
//!           | value (>|>=|<|<=) number
//!           | value BETWEEN number AND number
//!           | tag = string | tag IN '(' item {, item} ')' | tag LIKE string
//!           | ident op operand
//! date_sub := DATE_SUB '(' NOW '(' ')' , INTERVAL n (SECOND|MINUTE|HOUR|DAY) ')'
//! tscol    := timestamp | time
//! ```
//!
//! Keywords are case-insensitive and strings may be single- or double-quoted.
//! Each recognised predicate is extracted on its own whatever connective
//! joins it. Predicates on other columns, `HAVING` and trailing `ORDER BY`
//! columns are accepted and ignored.

use nom::{
    branch::alt,
    bytes::complete::{tag, tag_no_case, take_while, take_while1},
    character::complete::{char, digit1, multispace0, multispace1, satisfy},
    combinator::{map, map_res, not, opt, recognize, value},
    multi::{many0, separated_list1},
    sequence::{delimited, pair, preceded, separated_pair, terminated, tuple},
    IResult,
};
use regex::Regex;
use std::sync::LazyLock;
use tracing::debug;

use crate::historian::ast::*;
use crate::historian::error::{HistorianError, HistorianResult};
use crate::historian::types::TimeUnit;

/// Minimal shape every declarative query must have
static QUERY_SHAPE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)^\s*SELECT\b.*\bFROM\s+\S+").expect("query shape pattern is valid")
});

/// Parse a declarative query string
pub fn parse_query(input: &str) -> HistorianResult<ParsedQuery> {
    let input = input.trim();

    if !QUERY_SHAPE.is_match(input) {
        return Err(HistorianError::Parse(
            "query must have the form SELECT ... FROM <table>".to_string(),
        ));
    }

    match parse_full_query(input) {
        Ok((remaining, query)) => {
            let remaining = remaining.trim();
            if remaining.is_empty() {
                Ok(query)
            } else {
                Err(unexpected_input(remaining))
            }
        }
        Err(nom::Err::Error(e)) | Err(nom::Err::Failure(e)) => Err(HistorianError::Parse(
            format!("invalid query near '{}'", snippet(e.input)),
        )),
        Err(nom::Err::Incomplete(_)) => {
            Err(HistorianError::Parse("incomplete query".to_string()))
        }
    }
}

fn unexpected_input(remaining: &str) -> HistorianError {
    let word = remaining
        .split(|c: char| !is_identifier_char(c))
        .next()
        .unwrap_or_default()
        .to_uppercase();

    let message = match word.as_str() {
        "WHERE" | "AND" | "OR" => {
            format!("unsupported WHERE predicate near '{}'", snippet(remaining))
        }
        "HAVING" => format!("unsupported HAVING clause near '{}'", snippet(remaining)),
        _ => format!("unexpected input after query: '{}'", snippet(remaining)),
    };
    HistorianError::Parse(message)
}

fn snippet(input: &str) -> String {
    let trimmed = input.trim();
    if trimmed.chars().count() > 40 {
        format!("{}...", trimmed.chars().take(40).collect::<String>())
    } else {
        trimmed.to_string()
    }
}

/// A single WHERE condition before it is folded into [`WhereConditions`]
#[derive(Debug, Clone, PartialEq)]
enum Condition {
    TimestampFrom(String),
    TimestampUntil(String),
    TimestampBetween(String, String),
    Since(LegacyRange),
    ValueAbove(ValueBound),
    ValueBelow(ValueBound),
    ValueBetween(ValueRange),
    TagEq(String),
    TagIn(Vec<String>),
    TagLike(TagPattern),
    Group(Vec<Condition>),
    /// A predicate on a column the historian has no filter for
    Ignored(String),
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Comparison {
    Gt,
    Gte,
    Lt,
    Lte,
}

/// Parse the full query
fn parse_full_query(input: &str) -> IResult<&str, ParsedQuery> {
    let (input, (top, columns)) = parse_select_clause(input)?;
    let (input, _) = multispace0(input)?;
    let (input, _) = keyword("FROM")(input)?;
    let (input, _) = multispace1(input)?;
    let (input, table) = parse_table(input)?;
    let (input, conditions) = opt(preceded(multispace0, parse_where_clause))(input)?;
    let (input, group_by) = opt(preceded(multispace0, parse_group_by_clause))(input)?;
    let (input, _) = opt(preceded(multispace0, parse_having_clause))(input)?;
    let (input, order_by) = opt(preceded(multispace0, parse_order_by_clause))(input)?;
    let (input, limit) = opt(preceded(multispace0, parse_limit_clause))(input)?;
    let (input, _) = multispace0(input)?;
    let (input, _) = opt(char(';'))(input)?;

    let mut query = ParsedQuery {
        tag: None,
        limit: limit.or(top),
        columns,
        table,
        order_by,
        group_by: group_by.unwrap_or_default(),
        where_conditions: WhereConditions::default(),
        legacy_range: None,
    };

    if let Some(conditions) = conditions {
        let mut flattened = Vec::new();
        flatten(conditions, 0, &mut flattened);

        // First top-level `tag =` wins, then the first one found inside a group
        query.tag = flattened
            .iter()
            .filter(|(depth, _)| *depth == 0)
            .chain(flattened.iter().filter(|(depth, _)| *depth > 0))
            .find_map(|(_, condition)| match condition {
                Condition::TagEq(tag) if !tag.trim().is_empty() => Some(tag.trim().to_string()),
                _ => None,
            });

        for (_, condition) in flattened {
            fold_condition(&mut query, condition);
        }
        if query.tag.is_some() {
            query.where_conditions.tag_eq = query.tag.clone();
        }
    }

    Ok((input, query))
}

/// Flatten parenthesised groups into one conjunction, keeping nesting depth
fn flatten(conditions: Vec<Condition>, depth: usize, out: &mut Vec<(usize, Condition)>) {
    for condition in conditions {
        match condition {
            Condition::Group(inner) => flatten(inner, depth + 1, out),
            other => out.push((depth, other)),
        }
    }
}

/// Record a condition; the first occurrence of each predicate is kept
fn fold_condition(query: &mut ParsedQuery, condition: Condition) {
    let w = &mut query.where_conditions;
    match condition {
        Condition::TimestampFrom(ts) => {
            w.timestamp_gte.get_or_insert(ts);
        }
        Condition::TimestampUntil(ts) => {
            w.timestamp_lte.get_or_insert(ts);
        }
        Condition::TimestampBetween(start, end) => {
            w.timestamp_between
                .get_or_insert(TimestampRange { start, end });
        }
        Condition::Since(range) => {
            query.legacy_range.get_or_insert(range);
        }
        Condition::ValueAbove(bound) => {
            w.value_gt.get_or_insert(bound);
        }
        Condition::ValueBelow(bound) => {
            w.value_lt.get_or_insert(bound);
        }
        Condition::ValueBetween(range) => {
            w.value_between.get_or_insert(range);
        }
        Condition::TagEq(tag) => {
            w.tag_eq.get_or_insert(tag);
        }
        Condition::TagIn(tags) => {
            if w.tag_in.is_empty() {
                w.tag_in = tags;
            }
        }
        Condition::TagLike(pattern) => {
            w.tag_like.get_or_insert(pattern);
        }
        Condition::Group(inner) => {
            for condition in inner {
                fold_condition(query, condition);
            }
        }
        Condition::Ignored(predicate) => {
            debug!(predicate = %predicate, "Ignoring unsupported WHERE predicate");
        }
    }
}

/// Parse SELECT [TOP n] columns
fn parse_select_clause(input: &str) -> IResult<&str, (Option<usize>, Vec<String>)> {
    let (input, _) = keyword("SELECT")(input)?;
    let (input, _) = multispace1(input)?;
    let (input, top) = opt(terminated(parse_top, multispace1))(input)?;

    // Handle SELECT *
    if let Ok((input, _)) = char::<&str, nom::error::Error<&str>>('*')(input) {
        return Ok((input, (top, vec!["*".to_string()])));
    }

    let (input, columns) = separated_list1(symbol(','), parse_column)(input)?;
    Ok((input, (top, columns)))
}

fn parse_top(input: &str) -> IResult<&str, usize> {
    let (input, _) = keyword("TOP")(input)?;
    let (input, _) = multispace1(input)?;
    parse_count(input)
}

/// Parse a column like `value`, `MAX(value)` or `value AS v`
fn parse_column(input: &str) -> IResult<&str, String> {
    let (input, expr) = recognize(pair(
        parse_identifier,
        opt(tuple((
            symbol('('),
            alt((parse_identifier, tag("*"))),
            multispace0,
            char(')'),
        ))),
    ))(input)?;
    let (input, alias) = opt(preceded(
        tuple((multispace1, keyword("AS"), multispace1)),
        parse_identifier,
    ))(input)?;

    Ok((input, alias.unwrap_or(expr).to_string()))
}

/// Parse the table name, optionally bracketed
fn parse_table(input: &str) -> IResult<&str, String> {
    map(
        alt((
            delimited(char('['), take_while1(|c: char| c != ']'), char(']')),
            parse_identifier,
        )),
        |s: &str| s.to_string(),
    )(input)
}

/// Parse WHERE clause
fn parse_where_clause(input: &str) -> IResult<&str, Vec<Condition>> {
    let (input, _) = keyword("WHERE")(input)?;
    let (input, _) = multispace0(input)?;
    parse_conjunction(input)
}

fn parse_conjunction(input: &str) -> IResult<&str, Vec<Condition>> {
    separated_list1(
        delimited(
            multispace0,
            alt((keyword("AND"), keyword("OR"))),
            multispace0,
        ),
        parse_condition,
    )(input)
}

/// Parse a single condition
fn parse_condition(input: &str) -> IResult<&str, Condition> {
    alt((
        parse_group,
        parse_timestamp_condition,
        parse_value_condition,
        parse_tag_condition,
        parse_ignored_condition,
    ))(input)
}

/// Parse a parenthesised group like `(value > 1 AND value < 5)`
fn parse_group(input: &str) -> IResult<&str, Condition> {
    map(
        delimited(
            pair(char('('), multispace0),
            parse_conjunction,
            pair(multispace0, char(')')),
        ),
        Condition::Group,
    )(input)
}

/// Parse timestamp condition like "timestamp >= '2025-01-01T00:00:00'"
fn parse_timestamp_condition(input: &str) -> IResult<&str, Condition> {
    let (input, _) = alt((keyword("timestamp"), keyword("time")))(input)?;
    let (input, _) = multispace0(input)?;

    alt((
        map(
            preceded(
                pair(keyword("BETWEEN"), multispace0),
                separated_pair(parse_string, and_separator, parse_string),
            ),
            |(start, end)| Condition::TimestampBetween(start, end),
        ),
        map(
            preceded(pair(alt((tag(">="), tag(">"))), multispace0), parse_date_sub),
            Condition::Since,
        ),
        map(
            preceded(pair(alt((tag(">="), tag(">"))), multispace0), parse_string),
            Condition::TimestampFrom,
        ),
        map(
            preceded(pair(alt((tag("<="), tag("<"))), multispace0), parse_string),
            Condition::TimestampUntil,
        ),
    ))(input)
}

/// Parse `DATE_SUB(NOW(), INTERVAL n UNIT)`
fn parse_date_sub(input: &str) -> IResult<&str, LegacyRange> {
    let (input, _) = keyword("DATE_SUB")(input)?;
    let (input, _) = symbol('(')(input)?;
    let (input, _) = keyword("NOW")(input)?;
    let (input, _) = symbol('(')(input)?;
    let (input, _) = symbol(')')(input)?;
    let (input, _) = symbol(',')(input)?;
    let (input, _) = keyword("INTERVAL")(input)?;
    let (input, _) = multispace1(input)?;
    let (input, amount) = map_res(digit1, |s: &str| s.parse::<i64>())(input)?;
    let (input, _) = multispace1(input)?;
    let (input, unit) = parse_time_unit(input)?;
    let (input, _) = multispace0(input)?;
    let (input, _) = char(')')(input)?;

    Ok((input, LegacyRange { amount, unit }))
}

fn parse_time_unit(input: &str) -> IResult<&str, TimeUnit> {
    alt((
        value(TimeUnit::Second, keyword("SECOND")),
        value(TimeUnit::Minute, keyword("MINUTE")),
        value(TimeUnit::Hour, keyword("HOUR")),
        value(TimeUnit::Day, keyword("DAY")),
    ))(input)
}

/// Parse value condition like "value > 5" or "value BETWEEN 1 AND 2"
fn parse_value_condition(input: &str) -> IResult<&str, Condition> {
    let (input, _) = keyword("value")(input)?;
    let (input, _) = multispace0(input)?;

    alt((
        map(
            preceded(
                pair(keyword("BETWEEN"), multispace0),
                separated_pair(parse_number, and_separator, parse_number),
            ),
            |(min, max)| Condition::ValueBetween(ValueRange { min, max }),
        ),
        map(
            separated_pair(parse_comparison, multispace0, parse_number),
            |(cmp, limit)| match cmp {
                Comparison::Gt => Condition::ValueAbove(ValueBound { limit, inclusive: false }),
                Comparison::Gte => Condition::ValueAbove(ValueBound { limit, inclusive: true }),
                Comparison::Lt => Condition::ValueBelow(ValueBound { limit, inclusive: false }),
                Comparison::Lte => Condition::ValueBelow(ValueBound { limit, inclusive: true }),
            },
        ),
    ))(input)
}

/// Parse tag condition like "tag = 'T1'", "tag IN ('A', 'B')" or "tag LIKE 'Pump%'"
fn parse_tag_condition(input: &str) -> IResult<&str, Condition> {
    let (input, _) = keyword("tag")(input)?;
    let (input, _) = multispace0(input)?;

    alt((
        map(preceded(pair(char('='), multispace0), parse_string), Condition::TagEq),
        map(
            preceded(
                pair(keyword("IN"), multispace0),
                delimited(
                    symbol('('),
                    separated_list1(symbol(','), parse_list_item),
                    pair(multispace0, char(')')),
                ),
            ),
            Condition::TagIn,
        ),
        map(
            preceded(
                pair(keyword("LIKE"), multispace0),
                map_res(parse_string, |pattern: String| TagPattern::new(pattern)),
            ),
            Condition::TagLike,
        ),
    ))(input)
}

/// Parse any other `column op operand` predicate so it can be skipped
fn parse_ignored_condition(input: &str) -> IResult<&str, Condition> {
    map(
        recognize(tuple((
            parse_identifier,
            multispace0,
            alt((
                tag("<>"),
                tag("!="),
                tag(">="),
                tag("<="),
                tag("="),
                tag(">"),
                tag("<"),
                terminated(keyword("LIKE"), multispace0),
                terminated(keyword("IN"), multispace0),
            )),
            multispace0,
            parse_operand,
        ))),
        |predicate: &str| Condition::Ignored(predicate.to_string()),
    )(input)
}

/// A literal, a parenthesised list or a function call like `NOW()`
fn parse_operand(input: &str) -> IResult<&str, &str> {
    alt((
        recognize(parse_string),
        recognize(parse_number),
        recognize(pair(parse_identifier, opt(parse_parenthesised))),
        parse_parenthesised,
    ))(input)
}

/// Balanced parentheses with whatever they contain
fn parse_parenthesised(input: &str) -> IResult<&str, &str> {
    recognize(delimited(
        char('('),
        many0(alt((
            take_while1(|c: char| c != '(' && c != ')'),
            parse_parenthesised,
        ))),
        char(')'),
    ))(input)
}

fn parse_list_item(input: &str) -> IResult<&str, String> {
    alt((
        parse_string,
        map(
            take_while1(|c: char| !c.is_whitespace() && c != ',' && c != ')'),
            |s: &str| s.to_string(),
        ),
    ))(input)
}

/// Parse GROUP BY clause
fn parse_group_by_clause(input: &str) -> IResult<&str, Vec<String>> {
    let (input, _) = keyword("GROUP")(input)?;
    let (input, _) = multispace1(input)?;
    let (input, _) = keyword("BY")(input)?;
    let (input, _) = multispace1(input)?;
    separated_list1(symbol(','), map(parse_identifier, |s: &str| s.to_string()))(input)
}

/// Parse HAVING clause; its conditions never reach the historian
fn parse_having_clause(input: &str) -> IResult<&str, Vec<Condition>> {
    let (input, _) = keyword("HAVING")(input)?;
    let (input, _) = multispace0(input)?;
    parse_conjunction(input)
}

/// Parse ORDER BY clause; only the first column is recorded
fn parse_order_by_clause(input: &str) -> IResult<&str, OrderBy> {
    let (input, _) = keyword("ORDER")(input)?;
    let (input, _) = multispace1(input)?;
    let (input, _) = keyword("BY")(input)?;
    let (input, _) = multispace1(input)?;
    let (input, (column, descending)) = terminated(
        parse_order_column,
        many0(preceded(symbol(','), parse_order_column)),
    )(input)?;

    Ok((
        input,
        OrderBy {
            column: column.to_string(),
            descending,
        },
    ))
}

/// Parse LIMIT clause
fn parse_limit_clause(input: &str) -> IResult<&str, usize> {
    let (input, _) = keyword("LIMIT")(input)?;
    let (input, _) = multispace1(input)?;
    parse_count(input)
}

fn parse_order_column(input: &str) -> IResult<&str, (&str, bool)> {
    let (input, column) = parse_identifier(input)?;
    let (input, descending) = opt(preceded(
        multispace1,
        alt((value(true, keyword("DESC")), value(false, keyword("ASC")))),
    ))(input)?;
    Ok((input, (column, descending.unwrap_or(false))))
}

fn parse_comparison(input: &str) -> IResult<&str, Comparison> {
    alt((
        value(Comparison::Gte, tag(">=")),
        value(Comparison::Lte, tag("<=")),
        value(Comparison::Gt, tag(">")),
        value(Comparison::Lt, tag("<")),
    ))(input)
}

/// Match a keyword case-insensitively, refusing to split an identifier
fn keyword<'a>(word: &'static str) -> impl FnMut(&'a str) -> IResult<&'a str, &'a str> {
    terminated(tag_no_case(word), not(satisfy(is_identifier_char)))
}

/// Single punctuation character with surrounding whitespace
fn symbol<'a>(c: char) -> impl FnMut(&'a str) -> IResult<&'a str, char> {
    delimited(multispace0, char(c), multispace0)
}

fn and_separator(input: &str) -> IResult<&str, &str> {
    delimited(multispace0, keyword("AND"), multispace0)(input)
}

fn is_identifier_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// Parse identifier (column, table, etc.)
fn parse_identifier(input: &str) -> IResult<&str, &str> {
    recognize(pair(
        take_while1(|c: char| c.is_alphabetic() || c == '_'),
        take_while(|c: char| c.is_alphanumeric() || c == '_' || c == '.'),
    ))(input)
}

/// Parse a single- or double-quoted string
fn parse_string(input: &str) -> IResult<&str, String> {
    map(
        alt((
            delimited(char('\''), take_while(|c| c != '\''), char('\'')),
            delimited(char('"'), take_while(|c| c != '"'), char('"')),
        )),
        |s: &str| s.to_string(),
    )(input)
}

fn parse_count(input: &str) -> IResult<&str, usize> {
    map_res(digit1, |s: &str| s.parse::<usize>())(input)
}

/// Parse floating point number, with an optional exponent
fn parse_number(input: &str) -> IResult<&str, f64> {
    map_res(
        recognize(tuple((
            opt(alt((char('-'), char('+')))),
            digit1,
            opt(pair(char('.'), digit1)),
            opt(tuple((
                alt((char('e'), char('E'))),
                opt(alt((char('-'), char('+')))),
                digit1,
            ))),
        ))),
        |s: &str| s.parse::<f64>(),
    )(input)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_golden_query() {
        let query = parse_query(
            "SELECT TOP 5 * FROM Point WHERE tag = 'T1' AND timestamp BETWEEN '2025-01-01T00:00:00' AND '2025-01-01T01:00:00' ORDER BY timestamp DESC",
        )
        .unwrap();

        assert_eq!(query.tag.as_deref(), Some("T1"));
        assert_eq!(query.limit, Some(5));
        assert_eq!(
            query.where_conditions.timestamp_between,
            Some(TimestampRange {
                start: "2025-01-01T00:00:00".to_string(),
                end: "2025-01-01T01:00:00".to_string(),
            })
        );
        assert_eq!(
            query.order_by,
            Some(OrderBy {
                column: "timestamp".to_string(),
                descending: true,
            })
        );
        assert_eq!(query.table, "Point");
        assert_eq!(query.columns, vec!["*".to_string()]);
    }

    #[test]
    fn test_limit_wins_over_top() {
        let query = parse_query("SELECT TOP 5 * FROM Point LIMIT 20").unwrap();
        assert_eq!(query.limit, Some(20));

        let query = parse_query("SELECT TOP 7 value FROM Point").unwrap();
        assert_eq!(query.limit, Some(7));

        let query = parse_query("SELECT * FROM Point").unwrap();
        assert_eq!(query.limit, None);
    }

    #[test]
    fn test_parse_case_insensitive_and_double_quotes() {
        let query =
            parse_query(r#"select * from point where TAG = "Boiler.Temp" limit 3;"#).unwrap();
        assert_eq!(query.tag.as_deref(), Some("Boiler.Temp"));
        assert_eq!(query.limit, Some(3));
    }

    #[test]
    fn test_parse_timestamp_bounds() {
        let query = parse_query(
            "SELECT * FROM Point WHERE time >= '2025-01-01T00:00:00' AND timestamp < '2025-01-02T00:00:00'",
        )
        .unwrap();
        assert_eq!(
            query.where_conditions.timestamp_gte.as_deref(),
            Some("2025-01-01T00:00:00")
        );
        assert_eq!(
            query.where_conditions.timestamp_lte.as_deref(),
            Some("2025-01-02T00:00:00")
        );
        assert!(query.has_time_predicate());
    }

    #[test]
    fn test_parse_legacy_date_sub() {
        let query = parse_query(
            "SELECT * FROM Point WHERE timestamp >= DATE_SUB(NOW(), INTERVAL 2 HOUR) AND tag = 'T9'",
        )
        .unwrap();
        assert_eq!(
            query.legacy_range,
            Some(LegacyRange {
                amount: 2,
                unit: TimeUnit::Hour
            })
        );
        assert!(query.where_conditions.timestamp_gte.is_none());
        assert_eq!(query.tag.as_deref(), Some("T9"));
    }

    #[test]
    fn test_parse_value_predicates() {
        let query =
            parse_query("SELECT * FROM Point WHERE value >= 10 AND value < 20.5").unwrap();
        assert_eq!(
            query.where_conditions.value_gt,
            Some(ValueBound {
                limit: 10.0,
                inclusive: true
            })
        );
        assert_eq!(
            query.where_conditions.value_lt,
            Some(ValueBound {
                limit: 20.5,
                inclusive: false
            })
        );

        let query = parse_query("SELECT * FROM Point WHERE value BETWEEN -1 AND 1").unwrap();
        assert_eq!(
            query.where_conditions.value_between,
            Some(ValueRange { min: -1.0, max: 1.0 })
        );
    }

    #[test]
    fn test_parse_tag_set_and_pattern() {
        let query = parse_query(
            "SELECT * FROM Point WHERE tag IN ('A', \"B\", C) AND tag LIKE 'Pump%'",
        )
        .unwrap();
        assert_eq!(query.where_conditions.tag_in, vec!["A", "B", "C"]);
        assert_eq!(
            query.where_conditions.tag_like.as_ref().map(|p| p.pattern.as_str()),
            Some("Pump%")
        );
        assert_eq!(query.tag, None);
    }

    #[test]
    fn test_tag_fallback_scans_groups() {
        let query =
            parse_query("SELECT * FROM Point WHERE (tag = 'N1' AND value > 1)").unwrap();
        assert_eq!(query.tag.as_deref(), Some("N1"));
        assert!(query.where_conditions.value_gt.is_some());

        let query = parse_query(
            "SELECT * FROM Point WHERE (value > 1 AND tag = 'N1') AND tag = 'T1'",
        )
        .unwrap();
        assert_eq!(query.tag.as_deref(), Some("T1"));
    }

    #[test]
    fn test_first_occurrence_wins() {
        let query = parse_query(
            "SELECT * FROM Point WHERE value > 5 AND value > 50",
        )
        .unwrap();
        assert_eq!(query.where_conditions.value_gt.map(|b| b.limit), Some(5.0));
    }

    #[test]
    fn test_parse_columns_and_group_by() {
        let query = parse_query(
            "SELECT tag, MAX(value) AS peak FROM [Point] GROUP BY tag, timestamp ORDER BY timestamp",
        )
        .unwrap();
        assert_eq!(query.columns, vec!["tag", "peak"]);
        assert_eq!(query.table, "Point");
        assert_eq!(query.group_by, vec!["tag", "timestamp"]);
        assert_eq!(query.order_by.map(|o| o.descending), Some(false));
    }

    #[test]
    fn test_shape_check_rejects() {
        assert!(matches!(
            parse_query("SHOW TABLES"),
            Err(HistorianError::Parse(_))
        ));
        assert!(matches!(
            parse_query("SELECT value"),
            Err(HistorianError::Parse(_))
        ));
    }

    #[test]
    fn test_or_keeps_first_tag() {
        let query = parse_query("SELECT * FROM Point WHERE tag = 'T1' OR tag = 'T2'").unwrap();
        assert_eq!(query.tag.as_deref(), Some("T1"));
        assert_eq!(query.where_conditions.tag_eq.as_deref(), Some("T1"));

        let query =
            parse_query("SELECT * FROM Point WHERE value > 5 OR timestamp >= '2025-01-01'")
                .unwrap();
        assert_eq!(query.where_conditions.value_gt.map(|b| b.limit), Some(5.0));
        assert_eq!(
            query.where_conditions.timestamp_gte.as_deref(),
            Some("2025-01-01")
        );
    }

    #[test]
    fn test_having_is_ignored() {
        let query =
            parse_query("SELECT * FROM Point GROUP BY tag HAVING value > 1 LIMIT 4").unwrap();
        assert_eq!(query.group_by, vec!["tag"]);
        assert_eq!(query.where_conditions.value_gt, None);
        assert_eq!(query.limit, Some(4));
    }

    #[test]
    fn test_unknown_predicates_are_skipped() {
        let query = parse_query("SELECT * FROM Point WHERE quality = 'good'").unwrap();
        assert_eq!(query.where_conditions, WhereConditions::default());

        let query = parse_query(
            "SELECT * FROM Point WHERE tag = 'T1' AND quality = 'good' AND value < 3",
        )
        .unwrap();
        assert_eq!(query.tag.as_deref(), Some("T1"));
        assert_eq!(query.where_conditions.value_lt.map(|b| b.limit), Some(3.0));

        let query = parse_query(
            "SELECT * FROM Point WHERE status IN ('run', 'idle') AND updated <> NOW() AND unit LIKE 'deg%'",
        )
        .unwrap();
        assert_eq!(query.where_conditions, WhereConditions::default());
    }

    #[test]
    fn test_unparseable_predicate_is_named() {
        let err = parse_query("SELECT * FROM Point WHERE tag = 'T1' AND quality IS NULL")
            .unwrap_err();
        assert!(err.to_string().contains("unsupported WHERE predicate"));
        assert!(err.to_string().contains("quality IS NULL"));

        let err = parse_query("SELECT * FROM Point WHERE quality IS NULL").unwrap_err();
        assert!(err.to_string().contains("unsupported WHERE predicate"));
    }

    #[test]
    fn test_order_by_records_first_column() {
        let query =
            parse_query("SELECT * FROM Point ORDER BY timestamp DESC, value ASC LIMIT 2").unwrap();
        assert_eq!(
            query.order_by,
            Some(OrderBy {
                column: "timestamp".to_string(),
                descending: true,
            })
        );
        assert_eq!(query.limit, Some(2));
    }

    #[test]
    fn test_value_with_exponent() {
        let query = parse_query("SELECT * FROM Point WHERE value > 1e3").unwrap();
        assert_eq!(query.where_conditions.value_gt.map(|b| b.limit), Some(1000.0));

        let query =
            parse_query("SELECT * FROM Point WHERE value BETWEEN -2.5E-1 AND 4E+2").unwrap();
        assert_eq!(
            query.where_conditions.value_between,
            Some(ValueRange {
                min: -0.25,
                max: 400.0
            })
        );
    }

    #[test]
    fn test_keyword_boundaries() {
        // `timestamps` is not the timestamp column
        let query =
            parse_query("SELECT * FROM Point WHERE timestamps >= '2025-01-01'").unwrap();
        assert!(!query.has_time_predicate());
        // A table that starts with a keyword is still a table
        let query = parse_query("SELECT * FROM WHEREHOUSE").unwrap();
        assert_eq!(query.table, "WHEREHOUSE");
    }
}
