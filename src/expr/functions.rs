use super::ast::{Expr, Literal};
use super::lower::{Lowerer, python_str};
use crate::error::ExpressionError;
use itertools::Itertools;

/// How many arguments a function accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    Exact(usize),
    AtLeast(usize),
}

impl Arity {
    pub fn accepts(&self, count: usize) -> bool {
        match self {
            Arity::Exact(n) => count == *n,
            Arity::AtLeast(n) => count >= *n,
        }
    }
}

/// How a mapped function becomes target code.
///
/// Templates use `{N}` for the lowered column expression of argument `N`, `{=N}` for
/// argument `N` as a plain Python constant, and `{*}` for all arguments comma-joined.
#[derive(Clone, Copy)]
pub enum Lowering {
    Template(&'static str),
    Custom(fn(&mut Lowerer, &[Expr]) -> String),
}

/// One entry of the function-mapping table.
pub struct FunctionSpec {
    pub name: &'static str,
    pub arity: Arity,
    pub lowering: Lowering,
}

impl FunctionSpec {
    pub(crate) fn lower(&self, lowerer: &mut Lowerer, args: &[Expr]) -> String {
        match self.lowering {
            Lowering::Template(template) => render_template(template, self.name, lowerer, args),
            Lowering::Custom(lower) => lower(lowerer, args),
        }
    }
}

/// Finds the mapping for `name` (case-insensitive) called with `argc` arguments.
pub fn lookup(name: &str, argc: usize) -> Option<&'static FunctionSpec> {
    FUNCTIONS
        .iter()
        .find(|f| f.name.eq_ignore_ascii_case(name) && f.arity.accepts(argc))
}

/// The full mapping table.
pub fn functions() -> &'static [FunctionSpec] {
    FUNCTIONS
}

fn render_template(template: &str, name: &str, lowerer: &mut Lowerer, args: &[Expr]) -> String {
    let mut out = String::with_capacity(template.len() + 16);
    let mut rest = template;
    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let Some(close) = rest[open..].find('}') else {
            break;
        };
        let slot = &rest[open + 1..open + close];
        rest = &rest[open + close + 1..];

        if slot == "*" {
            let joined = args.iter().map(|a| lowerer.lower(a)).join(", ");
            out.push_str(&joined);
        } else if let Some(index) = slot.strip_prefix('=').and_then(|i| i.parse::<usize>().ok()) {
            if let Some(arg) = args.get(index) {
                out.push_str(&lowerer.scalar(name, index, arg));
            }
        } else if let Some(arg) = slot.parse::<usize>().ok().and_then(|i| args.get(i)) {
            out.push_str(&lowerer.lower(arg));
        }
    }
    out.push_str(rest);
    out
}

/// Declares the static function table.
macro_rules! function_table {
    ( $( ($name:literal, $arity:expr, $lowering:expr) ),* $(,)? ) => {
        static FUNCTIONS: &[FunctionSpec] = &[
            $( FunctionSpec { name: $name, arity: $arity, lowering: $lowering }, )*
        ];
    };
}

use Arity::{AtLeast, Exact};
use Lowering::{Custom, Template};

function_table! {
    // Strings
    ("Contains", AtLeast(2), Custom(contains)),
    ("StartsWith", AtLeast(2), Custom(starts_with)),
    ("EndsWith", AtLeast(2), Custom(ends_with)),
    ("Left", Exact(2), Template("F.substring({0}, 1, {=1})")),
    ("Right", Exact(2), Template("F.substring({0}, -{=1}, {=1})")),
    ("Substring", Exact(3), Template("F.substring({0}, {=1} + 1, {=2})")),
    ("Substring", Exact(2), Template("{0}.substr({1} + F.lit(1), F.length({0}))")),
    ("Length", Exact(1), Template("F.length({0})")),
    ("Uppercase", Exact(1), Template("F.upper({0})")),
    ("Lowercase", Exact(1), Template("F.lower({0})")),
    ("TitleCase", Exact(1), Template("F.initcap({0})")),
    ("Trim", Exact(1), Template("F.trim({0})")),
    ("TrimLeft", Exact(1), Template("F.ltrim({0})")),
    ("TrimRight", Exact(1), Template("F.rtrim({0})")),
    ("PadLeft", Exact(3), Template("F.lpad({0}, {=1}, {=2})")),
    ("PadRight", Exact(3), Template("F.rpad({0}, {=1}, {=2})")),
    ("FindString", Exact(2), Template("(F.instr({0}, {=1}) - 1)")),
    ("Replace", Exact(3), Template("F.replace({0}, {1}, {2})")),
    ("ReverseString", Exact(1), Template("F.reverse({0})")),
    ("CountWords", Exact(1), Template(r#"F.size(F.split(F.trim({0}), "\\s+"))"#)),
    ("GetWord", Exact(2), Template(r#"F.split(F.trim({0}), "\\s+").getItem({=1})"#)),
    ("CharToInt", Exact(1), Template("F.ascii({0})")),
    ("REGEX_Match", Exact(2), Custom(regex_match)),
    ("REGEX_Replace", Exact(3), Template("F.regexp_replace({0}, {=1}, {=2})")),
    ("REGEX_CountMatches", Exact(2), Template("(F.size(F.split({0}, {=1})) - 1)")),
    // Conversion
    ("ToNumber", Exact(1), Template("{0}.cast(\"double\")")),
    ("ToString", Exact(1), Template("{0}.cast(\"string\")")),
    ("ToString", Exact(2), Template("F.format_number({0}, {=1})")),
    ("ToDate", Exact(1), Template("F.to_date({0})")),
    ("ToDateTime", Exact(1), Template("F.to_timestamp({0})")),
    // Tests and nulls
    ("IsNull", Exact(1), Template("{0}.isNull()")),
    ("IsEmpty", Exact(1), Template("({0}.isNull() | ({0} == F.lit(\"\")))")),
    ("IsNumber", Exact(1), Template("{0}.cast(\"double\").isNotNull()")),
    ("Null", Exact(0), Template("F.lit(None)")),
    ("IIF", Exact(3), Template("F.when({0}, {1}).otherwise({2})")),
    ("Switch", AtLeast(2), Custom(switch)),
    // Math
    ("ABS", Exact(1), Template("F.abs({0})")),
    ("CEIL", Exact(1), Template("F.ceil({0})")),
    ("FLOOR", Exact(1), Template("F.floor({0})")),
    ("ROUND", Exact(2), Template("(F.round({0} / {1}) * {1})")),
    ("SQRT", Exact(1), Template("F.sqrt({0})")),
    ("POW", Exact(2), Template("F.pow({0}, {1})")),
    ("EXP", Exact(1), Template("F.exp({0})")),
    ("LOG", Exact(1), Template("F.log({0})")),
    ("LOG10", Exact(1), Template("F.log10({0})")),
    ("MOD", Exact(2), Template("({0} % {1})")),
    ("Min", AtLeast(2), Template("F.least({*})")),
    ("Max", AtLeast(2), Template("F.greatest({*})")),
    ("RAND", Exact(0), Template("F.rand()")),
    ("RandInt", Exact(1), Template("F.floor(F.rand() * ({0} + F.lit(1)))")),
    ("PI", Exact(0), Template("F.lit(3.141592653589793)")),
    ("SIN", Exact(1), Template("F.sin({0})")),
    ("COS", Exact(1), Template("F.cos({0})")),
    ("TAN", Exact(1), Template("F.tan({0})")),
    // Dates
    ("DateTimeNow", Exact(0), Template("F.current_timestamp()")),
    ("DateTimeToday", Exact(0), Template("F.current_date()")),
    ("DateTimeYear", Exact(1), Template("F.year({0})")),
    ("DateTimeMonth", Exact(1), Template("F.month({0})")),
    ("DateTimeDay", Exact(1), Template("F.dayofmonth({0})")),
    ("DateTimeHour", Exact(1), Template("F.hour({0})")),
    ("DateTimeMinutes", Exact(1), Template("F.minute({0})")),
    ("DateTimeSeconds", Exact(1), Template("F.second({0})")),
    ("DateTimeFirstOfMonth", Exact(0), Template("F.trunc(F.current_date(), \"month\")")),
    ("DateTimeLastOfMonth", Exact(0), Template("F.last_day(F.current_date())")),
    ("DateTimeTrim", Exact(2), Template("F.date_trunc({=1}, {0})")),
    ("DateTimeAdd", Exact(3), Custom(date_time_add)),
    ("DateTimeDiff", Exact(3), Custom(date_time_diff)),
    ("DateTimeFormat", Exact(2), Custom(date_time_format)),
    ("DateTimeParse", Exact(2), Custom(date_time_parse)),
}

/// Reads a unit argument such as `"days"`, lower-cased with any plural `s` removed.
fn unit(lowerer: &mut Lowerer, name: &str, index: usize, arg: &Expr) -> Option<String> {
    match arg {
        Expr::Literal(Literal::String(s)) => {
            let unit = s.trim().to_ascii_lowercase();
            Some(unit.strip_suffix('s').unwrap_or(&unit).to_string())
        }
        _ => {
            lowerer.note(ExpressionError::NonConstantArgument {
                name: name.to_string(),
                index,
            });
            None
        }
    }
}

fn unsupported_unit(lowerer: &mut Lowerer, name: &str, index: usize, unit: &str) {
    lowerer.note(ExpressionError::UnsupportedArgument {
        name: name.to_string(),
        index,
        value: unit.to_string(),
    });
}

fn date_time_add(lowerer: &mut Lowerer, args: &[Expr]) -> String {
    let dt = lowerer.lower(&args[0]);
    let n = lowerer.lower(&args[1]);
    match unit(lowerer, "DateTimeAdd", 2, &args[2]).as_deref() {
        Some("year") => format!("F.add_months({}, {} * 12)", dt, n),
        Some("month") => format!("F.add_months({}, {})", dt, n),
        Some("week") => format!("F.date_add({}, {} * 7)", dt, n),
        Some("hour") => format!("({} + F.make_dt_interval(hours={}))", dt, n),
        Some("minute") => format!("({} + F.make_dt_interval(mins={}))", dt, n),
        Some("second") => format!("({} + F.make_dt_interval(secs={}))", dt, n),
        Some("day") | None => format!("F.date_add({}, {})", dt, n),
        Some(other) => {
            unsupported_unit(lowerer, "DateTimeAdd", 2, other);
            format!("F.date_add({}, {})", dt, n)
        }
    }
}

fn date_time_diff(lowerer: &mut Lowerer, args: &[Expr]) -> String {
    let end = lowerer.lower(&args[0]);
    let start = lowerer.lower(&args[1]);
    let seconds = |divisor: u32| {
        format!(
            "F.floor((F.unix_timestamp({}) - F.unix_timestamp({})) / {})",
            end, start, divisor
        )
    };
    match unit(lowerer, "DateTimeDiff", 2, &args[2]).as_deref() {
        Some("year") => format!("F.floor(F.months_between({}, {}) / 12)", end, start),
        Some("month") => format!("F.floor(F.months_between({}, {}))", end, start),
        Some("week") => format!("F.floor(F.datediff({}, {}) / 7)", end, start),
        Some("hour") => seconds(3600),
        Some("minute") => seconds(60),
        Some("second") => seconds(1),
        Some("day") | None => format!("F.datediff({}, {})", end, start),
        Some(other) => {
            unsupported_unit(lowerer, "DateTimeDiff", 2, other);
            format!("F.datediff({}, {})", end, start)
        }
    }
}

fn date_time_format(lowerer: &mut Lowerer, args: &[Expr]) -> String {
    let dt = lowerer.lower(&args[0]);
    let pattern = java_pattern(lowerer, "DateTimeFormat", &args[1]);
    format!("F.date_format({}, {})", dt, pattern)
}

fn date_time_parse(lowerer: &mut Lowerer, args: &[Expr]) -> String {
    let text = lowerer.lower(&args[0]);
    let pattern = java_pattern(lowerer, "DateTimeParse", &args[1]);
    format!("F.to_timestamp({}, {})", text, pattern)
}

/// Converts a strftime-style format literal into a quoted Java datetime pattern.
fn java_pattern(lowerer: &mut Lowerer, name: &str, arg: &Expr) -> String {
    let Expr::Literal(Literal::String(format)) = arg else {
        lowerer.note(ExpressionError::NonConstantArgument {
            name: name.to_string(),
            index: 1,
        });
        return lowerer.lower(arg);
    };

    let mut pattern = String::new();
    let mut literal = String::new();
    let mut chars = format.chars();
    let flush = |pattern: &mut String, literal: &mut String| {
        if !literal.is_empty() {
            pattern.push('\'');
            pattern.push_str(&literal.replace('\'', "''"));
            pattern.push('\'');
            literal.clear();
        }
    };

    while let Some(c) = chars.next() {
        if c != '%' {
            if c.is_ascii_alphabetic() || c == '\'' {
                literal.push(c);
            } else {
                flush(&mut pattern, &mut literal);
                pattern.push(c);
            }
            continue;
        }
        let directive = chars.next().unwrap_or('%');
        let mapped = match directive {
            'Y' => "yyyy",
            'y' => "yy",
            'm' => "MM",
            'd' => "dd",
            'e' => "d",
            'H' => "HH",
            'I' => "hh",
            'M' => "mm",
            'S' => "ss",
            'p' => "a",
            'b' => "MMM",
            'B' => "MMMM",
            'a' => "EEE",
            'A' => "EEEE",
            'j' => "DDD",
            '%' => "%",
            other => {
                lowerer.note(ExpressionError::UnsupportedArgument {
                    name: name.to_string(),
                    index: 1,
                    value: format!("%{}", other),
                });
                ""
            }
        };
        flush(&mut pattern, &mut literal);
        pattern.push_str(mapped);
    }
    flush(&mut pattern, &mut literal);
    python_str(&pattern)
}

fn contains(lowerer: &mut Lowerer, args: &[Expr]) -> String {
    text_match(lowerer, "Contains", "contains", args)
}

fn starts_with(lowerer: &mut Lowerer, args: &[Expr]) -> String {
    text_match(lowerer, "StartsWith", "startswith", args)
}

fn ends_with(lowerer: &mut Lowerer, args: &[Expr]) -> String {
    text_match(lowerer, "EndsWith", "endswith", args)
}

/// `Contains(text, target[, case_insensitive])` and friends.
///
/// Matching ignores case unless the third argument is a literal `0` or `FALSE`.
fn text_match(lowerer: &mut Lowerer, name: &str, method: &str, args: &[Expr]) -> String {
    let case_sensitive = match args.get(2) {
        None => false,
        Some(Expr::Literal(Literal::Bool(insensitive))) => !insensitive,
        Some(Expr::Literal(Literal::Integer(flag))) => *flag == 0,
        Some(_) => {
            lowerer.note(ExpressionError::NonConstantArgument {
                name: name.to_string(),
                index: 2,
            });
            false
        }
    };
    if args.len() > 3 {
        lowerer.note(ExpressionError::UnsupportedArgument {
            name: name.to_string(),
            index: 3,
            value: "extra argument".to_string(),
        });
    }
    let text = lowerer.lower(&args[0]);
    let target = lowerer.lower(&args[1]);
    if case_sensitive {
        format!("{}.{}({})", text, method, target)
    } else {
        format!("F.lower({}).{}(F.lower({}))", text, method, target)
    }
}

/// `Switch(value, default, case1, result1, ...)`.
fn switch(lowerer: &mut Lowerer, args: &[Expr]) -> String {
    let value = lowerer.lower(&args[0]);
    let default = lowerer.lower(&args[1]);
    let cases = &args[2..];
    if cases.len() % 2 == 1 {
        lowerer.note(ExpressionError::UnsupportedArgument {
            name: "Switch".to_string(),
            index: args.len() - 1,
            value: "case without a result".to_string(),
        });
    }
    let mut code = String::new();
    for (i, pair) in cases.chunks_exact(2).enumerate() {
        let case = lowerer.lower(&pair[0]);
        let result = lowerer.lower(&pair[1]);
        let head = if i == 0 { "F" } else { "" };
        code.push_str(&format!("{}.when(({} == {}), {})", head, value, case, result));
    }
    if code.is_empty() {
        default
    } else {
        format!("{}.otherwise({})", code, default)
    }
}

/// `REGEX_Match` must match the whole string, while `rlike` searches.
fn regex_match(lowerer: &mut Lowerer, args: &[Expr]) -> String {
    let subject = lowerer.lower(&args[0]);
    match &args[1] {
        Expr::Literal(Literal::String(pattern)) => {
            format!("{}.rlike({})", subject, python_str(&format!("^(?:{})$", pattern)))
        }
        other => {
            let pattern = lowerer.scalar("REGEX_Match", 1, other);
            format!("{}.rlike({})", subject, pattern)
        }
    }
}
