use super::context::EmitContext;
use crate::error::EmitError;
use crate::expr::python_str;
use crate::workflow::{
    DataLocation, InputPort, OutputPort, RegexMode, SampleMode, ToolConfig, ToolType,
};
use ahash::AHashMap;
use itertools::Itertools;

/// Emission rule for one tool type.
///
/// An emitter must assign a variable for every declared output port of its tool type,
/// named by [`EmitContext::output`]. Returning an error discards everything the emitter
/// wrote; the generator then emits a pass-through stub instead.
pub trait ToolEmitter: Send + Sync {
    fn tool_type(&self) -> ToolType;
    fn emit(&self, ctx: &mut EmitContext<'_>) -> Result<(), EmitError>;
}

macro_rules! define_emitters {
    ( $( ($struct_name:ident, $tool_type:path, $emit:ident) ),* $(,)? ) => {
        $(
            struct $struct_name;
            impl ToolEmitter for $struct_name {
                fn tool_type(&self) -> ToolType { $tool_type }
                fn emit(&self, ctx: &mut EmitContext<'_>) -> Result<(), EmitError> { $emit(ctx) }
            }
        )*

        pub(super) fn register_default_emitters(registry: &mut AHashMap<ToolType, Box<dyn ToolEmitter>>) {
            $( registry.insert($tool_type, Box::new($struct_name)); )*
        }
    };
}

define_emitters! {
    (InputEmitter, ToolType::Input, emit_input),
    (TextInputEmitter, ToolType::TextInput, emit_text_input),
    (OutputEmitter, ToolType::Output, emit_output),
    (BrowseEmitter, ToolType::Browse, emit_browse),
    (FilterEmitter, ToolType::Filter, emit_filter),
    (FormulaEmitter, ToolType::Formula, emit_formula),
    (SortEmitter, ToolType::Sort, emit_sort),
    (SampleEmitter, ToolType::Sample, emit_sample),
    (UniqueEmitter, ToolType::Unique, emit_unique),
    (FindReplaceEmitter, ToolType::FindReplace, emit_find_replace),
    (JoinEmitter, ToolType::Join, emit_join),
    (UnionEmitter, ToolType::Union, emit_union),
    (SummarizeEmitter, ToolType::Summarize, emit_summarize),
    (CrossTabEmitter, ToolType::CrossTab, emit_cross_tab),
    (TextToColumnsEmitter, ToolType::TextToColumns, emit_text_to_columns),
    (RegExEmitter, ToolType::RegEx, emit_regex),
    (InDbSelectEmitter, ToolType::InDbSelect, emit_in_db_select),
    (InDbFilterEmitter, ToolType::InDbFilter, emit_in_db_filter),
    (InDbJoinEmitter, ToolType::InDbJoin, emit_in_db_join),
    (InDbStreamOutEmitter, ToolType::InDbStreamOut, emit_in_db_stream_out),
}

const READ_FORMATS: &[&str] = &["csv", "parquet", "json", "delta", "avro", "orc", "text"];
const WRITE_MODES: &[&str] = &["overwrite", "append", "ignore", "error", "errorifexists"];

fn mismatch(ctx: &EmitContext<'_>) -> EmitError {
    EmitError::Unsupported(format!(
        "configuration does not match tool type {}",
        ctx.node().tool.tool_type
    ))
}

fn quoted_list(names: &[String]) -> String {
    names.iter().map(|n| python_str(n)).join(", ")
}

fn col(name: &str) -> String {
    format!("F.col({})", python_str(name))
}

fn py_bool(value: bool) -> &'static str {
    if value { "True" } else { "False" }
}

/// Writes `target = base.c1.c2...`, one call per line when there is more than one.
fn assign_chain(ctx: &mut EmitContext<'_>, target: &str, base: &str, calls: &[String]) {
    match calls {
        [] => ctx.line(format!("{} = {}", target, base)),
        [call] => ctx.line(format!("{} = {}.{}", target, base, call)),
        calls => {
            ctx.line(format!("{} = (", target));
            ctx.line(format!("    {}", base));
            for call in calls {
                ctx.line(format!("    .{}", call));
            }
            ctx.line(")");
        }
    }
}

fn emit_input(ctx: &mut EmitContext<'_>) -> Result<(), EmitError> {
    let ToolConfig::Input { location, header } = ctx.tool_config() else {
        return Err(mismatch(ctx));
    };
    let target = ctx.output(OutputPort::Default);
    let location_config = &ctx.config().input;
    let reader = match location {
        DataLocation::Table(name) => format!(
            "spark.read.table({})",
            python_str(&location_config.resolve_table(name))
        ),
        DataLocation::File { path, format } => {
            let path = location_config.resolve_file(path);
            if !READ_FORMATS.contains(&format.as_str()) {
                ctx.review(format!("format '{}' has no built-in Spark reader", format));
            }
            let mut reader = format!("spark.read.format({})", python_str(format));
            if format == "csv" {
                reader.push_str(&format!(".option(\"header\", {})", py_bool(*header)));
            }
            format!("{}.load({})", reader, python_str(&path))
        }
    };
    ctx.line(format!("{} = {}", target, reader));
    Ok(())
}

fn emit_text_input(ctx: &mut EmitContext<'_>) -> Result<(), EmitError> {
    let ToolConfig::TextInput { fields, rows } = ctx.tool_config() else {
        return Err(mismatch(ctx));
    };
    let target = ctx.output(OutputPort::Default);
    if rows.is_empty() {
        let schema = fields.iter().map(|f| format!("`{}` string", f)).join(", ");
        ctx.line(format!(
            "{} = spark.createDataFrame([], {})",
            target,
            python_str(&schema)
        ));
        return Ok(());
    }
    if rows.iter().any(|row| row.len() != fields.len()) {
        ctx.review(format!(
            "some rows do not have exactly {} value(s); they were padded or truncated",
            fields.len()
        ));
    }
    ctx.line(format!("{} = spark.createDataFrame(", target));
    ctx.line("    [");
    for row in rows {
        let cells = (0..fields.len())
            .map(|i| row.get(i).map_or("None".to_string(), |v| python_str(v)))
            .collect::<Vec<_>>();
        let tuple = match cells.as_slice() {
            [single] => format!("({},)", single),
            cells => format!("({})", cells.join(", ")),
        };
        ctx.line(format!("        {},", tuple));
    }
    ctx.line("    ],");
    ctx.line(format!("    [{}],", quoted_list(fields)));
    ctx.line(")");
    Ok(())
}

fn emit_output(ctx: &mut EmitContext<'_>) -> Result<(), EmitError> {
    let ToolConfig::Output { location, mode } = ctx.tool_config() else {
        return Err(mismatch(ctx));
    };
    let source = ctx.input(InputPort::Default)?;
    if !WRITE_MODES.contains(&mode.as_str()) {
        ctx.review(format!("write mode '{}' is not a Spark save mode", mode));
    }
    let location_config = &ctx.config().output;
    let writer = format!("{}.write.mode({})", source, python_str(mode));
    match location {
        DataLocation::Table(name) => ctx.line(format!(
            "{}.saveAsTable({})",
            writer,
            python_str(&location_config.resolve_table(name))
        )),
        DataLocation::File { path, format } => {
            let path = location_config.resolve_file(path);
            let header = if format == "csv" {
                ".option(\"header\", True)"
            } else {
                ""
            };
            ctx.line(format!(
                "{}.format({}){}.save({})",
                writer,
                python_str(format),
                header,
                python_str(&path)
            ));
        }
    }
    Ok(())
}

fn emit_browse(ctx: &mut EmitContext<'_>) -> Result<(), EmitError> {
    let source = ctx.input(InputPort::Default)?;
    ctx.line(format!("display({})", source));
    Ok(())
}

fn emit_filter(ctx: &mut EmitContext<'_>) -> Result<(), EmitError> {
    let ToolConfig::Filter { expression } = ctx.tool_config() else {
        return Err(mismatch(ctx));
    };
    let source = ctx.input(InputPort::Default)?;
    let condition = ctx.translate(expression);
    let cond = ctx.local("cond");
    ctx.line(format!("{} = {}", cond, condition));
    // Rows where the condition is null go to the False side.
    ctx.line(format!(
        "{}, {} = {}.filter({}), {}.filter(~F.coalesce({}, F.lit(False)))",
        ctx.output(OutputPort::True),
        ctx.output(OutputPort::False),
        source,
        cond,
        source,
        cond
    ));
    Ok(())
}

fn emit_formula(ctx: &mut EmitContext<'_>) -> Result<(), EmitError> {
    let ToolConfig::Formula { fields } = ctx.tool_config() else {
        return Err(mismatch(ctx));
    };
    let source = ctx.input(InputPort::Default)?;
    let calls = fields
        .iter()
        .map(|(name, formula)| {
            let code = ctx.translate(formula);
            format!("withColumn({}, {})", python_str(name), code)
        })
        .collect::<Vec<_>>();
    let target = ctx.output(OutputPort::Default);
    assign_chain(ctx, target.as_str(), source.as_str(), &calls);
    Ok(())
}

fn emit_sort(ctx: &mut EmitContext<'_>) -> Result<(), EmitError> {
    let ToolConfig::Sort { keys } = ctx.tool_config() else {
        return Err(mismatch(ctx));
    };
    let source = ctx.input(InputPort::Default)?;
    let order = keys
        .iter()
        .map(|k| {
            let direction = if k.descending { "desc_nulls_last" } else { "asc_nulls_first" };
            format!("{}.{}()", col(&k.field), direction)
        })
        .join(", ");
    ctx.line(format!(
        "{} = {}.orderBy({})",
        ctx.output(OutputPort::Default),
        source,
        order
    ));
    Ok(())
}

fn emit_sample(ctx: &mut EmitContext<'_>) -> Result<(), EmitError> {
    let ToolConfig::Sample { n, mode, seed } = ctx.tool_config() else {
        return Err(mismatch(ctx));
    };
    let source = ctx.input(InputPort::Default)?;
    let seed_arg = seed.map(|s| s.to_string()).unwrap_or_default();
    let sampled = match mode {
        SampleMode::First => format!("{}.limit({})", source, n),
        SampleMode::Random => format!("{}.orderBy(F.rand({})).limit({})", source, seed_arg, n),
        SampleMode::Percent => {
            if *n > 100 {
                ctx.review(format!("sample percentage {} exceeds 100", n));
            }
            let fraction = (*n).min(100) as f64 / 100.0;
            match seed {
                Some(seed) => format!("{}.sample(fraction={:?}, seed={})", source, fraction, seed),
                None => format!("{}.sample(fraction={:?})", source, fraction),
            }
        }
    };
    ctx.line(format!("{} = {}", ctx.output(OutputPort::Default), sampled));
    Ok(())
}

fn emit_unique(ctx: &mut EmitContext<'_>) -> Result<(), EmitError> {
    let ToolConfig::Unique { fields } = ctx.tool_config() else {
        return Err(mismatch(ctx));
    };
    let source = ctx.input(InputPort::Default)?;
    let window = ctx.local("_window");
    let ranked = ctx.local("_ranked");
    let row = ctx.local("_row");
    ctx.line(format!(
        "{} = Window.partitionBy({}).orderBy(F.monotonically_increasing_id())",
        window,
        quoted_list(fields)
    ));
    ctx.line(format!(
        "{} = {}.withColumn({}, F.row_number().over({}))",
        ranked,
        source,
        python_str(&row),
        window
    ));
    ctx.line(format!(
        "{} = {}.filter(F.col({}) == 1).drop({})",
        ctx.output(OutputPort::Unique),
        ranked,
        python_str(&row),
        python_str(&row)
    ));
    ctx.line(format!(
        "{} = {}.filter(F.col({}) > 1).drop({})",
        ctx.output(OutputPort::Duplicate),
        ranked,
        python_str(&row),
        python_str(&row)
    ));
    Ok(())
}

fn emit_find_replace(ctx: &mut EmitContext<'_>) -> Result<(), EmitError> {
    let ToolConfig::FindReplace {
        field,
        find,
        replace,
        regex,
    } = ctx.tool_config()
    else {
        return Err(mismatch(ctx));
    };
    let source = ctx.input(InputPort::Default)?;
    let (pattern, replacement) = if *regex {
        if let Err(e) = regex::Regex::new(find) {
            ctx.review(format!("search pattern does not compile: {}", e));
        }
        (find.clone(), replace.clone())
    } else {
        // Java replacement strings treat `\` and `$` specially.
        (
            regex::escape(find),
            replace.replace('\\', "\\\\").replace('$', "\\$"),
        )
    };
    ctx.line(format!(
        "{} = {}.withColumn({}, F.regexp_replace({}, {}, {}))",
        ctx.output(OutputPort::Default),
        source,
        python_str(field),
        col(field),
        python_str(&pattern),
        python_str(&replacement)
    ));
    Ok(())
}

/// Writes the join condition variable and returns its name.
fn join_condition(
    ctx: &mut EmitContext<'_>,
    left: &str,
    right: &str,
    left_keys: &[String],
    right_keys: &[String],
) -> String {
    let on = ctx.local("on");
    if left_keys == right_keys {
        // Joining on names keeps a single copy of each key column.
        ctx.line(format!("{} = [{}]", on, quoted_list(left_keys)));
    } else {
        let pairs = left_keys
            .iter()
            .zip(right_keys)
            .map(|(l, r)| format!("({}[{}] == {}[{}])", left, python_str(l), right, python_str(r)))
            .join(", ");
        ctx.line(format!("{} = [{}]", on, pairs));
    }
    on
}

fn emit_join(ctx: &mut EmitContext<'_>) -> Result<(), EmitError> {
    let ToolConfig::Join {
        left_keys,
        right_keys,
    } = ctx.tool_config()
    else {
        return Err(mismatch(ctx));
    };
    let left = ctx.input(InputPort::Left)?;
    let right = ctx.input(InputPort::Right)?;
    let on = join_condition(ctx, left.as_str(), right.as_str(), left_keys, right_keys);
    ctx.line(format!(
        "{} = {}.join({}, on={}, how=\"inner\")",
        ctx.output(OutputPort::Join),
        left,
        right,
        on
    ));
    ctx.line(format!(
        "{} = {}.join({}, on={}, how=\"left_anti\")",
        ctx.output(OutputPort::Left),
        left,
        right,
        on
    ));
    ctx.line(format!(
        "{} = {}.join({}, on={}, how=\"left_anti\")",
        ctx.output(OutputPort::Right),
        right,
        left,
        on
    ));
    Ok(())
}

fn emit_in_db_join(ctx: &mut EmitContext<'_>) -> Result<(), EmitError> {
    let ToolConfig::Join {
        left_keys,
        right_keys,
    } = ctx.tool_config()
    else {
        return Err(mismatch(ctx));
    };
    let left = ctx.input(InputPort::Left)?;
    let right = ctx.input(InputPort::Right)?;
    let on = join_condition(ctx, left.as_str(), right.as_str(), left_keys, right_keys);
    ctx.line(format!(
        "{} = {}.join({}, on={}, how=\"inner\")",
        ctx.output(OutputPort::Default),
        left,
        right,
        on
    ));
    Ok(())
}

fn emit_union(ctx: &mut EmitContext<'_>) -> Result<(), EmitError> {
    let ToolConfig::Union { by_name } = ctx.tool_config() else {
        return Err(mismatch(ctx));
    };
    let mut inputs = ctx.inputs().map(|(_, handle)| handle.to_string());
    let first = inputs.next().ok_or(EmitError::MissingInput(InputPort::Numbered(1)))?;
    let calls = inputs
        .map(|handle| {
            if *by_name {
                format!("unionByName({}, allowMissingColumns=True)", handle)
            } else {
                format!("union({})", handle)
            }
        })
        .collect::<Vec<_>>();
    let target = ctx.output(OutputPort::Default);
    assign_chain(ctx, target.as_str(), &first, &calls);
    Ok(())
}

fn emit_summarize(ctx: &mut EmitContext<'_>) -> Result<(), EmitError> {
    let ToolConfig::Summarize {
        group_by,
        aggregations,
    } = ctx.tool_config()
    else {
        return Err(mismatch(ctx));
    };
    let source = ctx.input(InputPort::Default)?;
    let grouped = if group_by.is_empty() {
        source.to_string()
    } else {
        format!("{}.groupBy({})", source, quoted_list(group_by))
    };
    ctx.line(format!("{} = {}.agg(", ctx.output(OutputPort::Default), grouped));
    for aggregation in aggregations {
        let column = match &aggregation.field {
            Some(field) => col(field),
            None => "F.lit(1)".to_string(),
        };
        ctx.line(format!(
            "    {}.alias({}),",
            aggregation.action.render(&column),
            python_str(&aggregation.alias)
        ));
    }
    ctx.line(")");
    Ok(())
}

fn emit_cross_tab(ctx: &mut EmitContext<'_>) -> Result<(), EmitError> {
    let ToolConfig::CrossTab {
        group_by,
        header,
        value,
        method,
    } = ctx.tool_config()
    else {
        return Err(mismatch(ctx));
    };
    let source = ctx.input(InputPort::Default)?;
    ctx.line(format!(
        "{} = {}.groupBy({}).pivot({}).agg({})",
        ctx.output(OutputPort::Default),
        source,
        quoted_list(group_by),
        python_str(header),
        method.render(&col(value))
    ));
    Ok(())
}

/// Turns a delimiter list into a split pattern; each character is its own delimiter.
fn split_pattern(delimiter: &str) -> String {
    let delimiter = delimiter.replace("\\t", "\t").replace("\\n", "\n");
    let chars: Vec<char> = delimiter.chars().collect();
    match chars.as_slice() {
        [single] => regex::escape(&single.to_string()),
        many => format!(
            "[{}]",
            many.iter().map(|c| regex::escape(&c.to_string())).join("")
        ),
    }
}

fn emit_text_to_columns(ctx: &mut EmitContext<'_>) -> Result<(), EmitError> {
    let ToolConfig::TextToColumns {
        field,
        delimiter,
        columns,
        root_name,
    } = ctx.tool_config()
    else {
        return Err(mismatch(ctx));
    };
    if *columns == 0 {
        return Err(EmitError::Unsupported(
            "TextToColumns needs at least one output column".to_string(),
        ));
    }
    let source = ctx.input(InputPort::Default)?;
    let parts = ctx.local("_parts");
    ctx.line(format!(
        "{} = F.split({}, {})",
        parts,
        col(field),
        python_str(&split_pattern(delimiter))
    ));
    let calls = (0..*columns)
        .map(|i| {
            format!(
                "withColumn({}, {}.getItem({}))",
                python_str(&format!("{}{}", root_name, i + 1)),
                parts,
                i
            )
        })
        .collect::<Vec<_>>();
    let target = ctx.output(OutputPort::Default);
    assign_chain(ctx, target.as_str(), source.as_str(), &calls);
    Ok(())
}

fn emit_regex(ctx: &mut EmitContext<'_>) -> Result<(), EmitError> {
    let ToolConfig::RegEx {
        field,
        pattern,
        mode,
    } = ctx.tool_config()
    else {
        return Err(mismatch(ctx));
    };
    let source = ctx.input(InputPort::Default)?;
    let target = ctx.output(OutputPort::Default);
    let calls = match mode {
        RegexMode::Match { output } => vec![format!(
            "withColumn({}, {}.rlike({}))",
            python_str(output),
            col(field),
            python_str(&format!("^(?:{})$", pattern))
        )],
        RegexMode::Parse { output } => {
            let groups = regex::Regex::new(pattern)
                .map(|re| re.captures_len().saturating_sub(1))
                .unwrap_or(0);
            let extract = |name: &str, group: usize| {
                format!(
                    "withColumn({}, F.regexp_extract({}, {}, {}))",
                    python_str(name),
                    col(field),
                    python_str(pattern),
                    group
                )
            };
            match groups {
                0 => vec![extract(output, 0)],
                1 => vec![extract(output, 1)],
                n => (1..=n)
                    .map(|g| extract(&format!("{}{}", output, g), g))
                    .collect(),
            }
        }
        RegexMode::Replace { replacement } => vec![format!(
            "withColumn({}, F.regexp_replace({}, {}, {}))",
            python_str(field),
            col(field),
            python_str(pattern),
            python_str(replacement)
        )],
    };
    assign_chain(ctx, target.as_str(), source.as_str(), &calls);
    Ok(())
}

fn emit_in_db_select(ctx: &mut EmitContext<'_>) -> Result<(), EmitError> {
    let ToolConfig::InDbSelect { query } = ctx.tool_config() else {
        return Err(mismatch(ctx));
    };
    ctx.line(format!(
        "{} = spark.sql({})",
        ctx.output(OutputPort::Default),
        python_str(query)
    ));
    Ok(())
}

fn emit_in_db_filter(ctx: &mut EmitContext<'_>) -> Result<(), EmitError> {
    let ToolConfig::InDbFilter { expression } = ctx.tool_config() else {
        return Err(mismatch(ctx));
    };
    let source = ctx.input(InputPort::Default)?;
    ctx.line(format!(
        "{} = {}.filter(F.expr({}))",
        ctx.output(OutputPort::Default),
        source,
        python_str(expression)
    ));
    Ok(())
}

fn emit_in_db_stream_out(ctx: &mut EmitContext<'_>) -> Result<(), EmitError> {
    let source = ctx.input(InputPort::Default)?;
    ctx.line(format!("{} = {}.cache()", ctx.output(OutputPort::Default), source));
    Ok(())
}
