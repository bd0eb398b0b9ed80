//! Prompt templates for the query and answer steps.

/// SQL dialect of the embedded engine, named in the query prompt.
pub const SQL_DIALECT: &str = "SQLite";

/// SQL-expert prompt asking for one query over `table`.
pub fn build_query_prompt(question: &str, table: &str, schema_text: &str, dialect: &str) -> String {
    format!(
        r#"You are a SQL expert. Your task is to generate a single, executable SQL query to answer the user's question based on the provided table schema.

User Query: "{question}"

Table Schema:
You can query the table named `{table}`. Quote column names with double quotes.
Columns (and types):
{schema_text}

Guidelines:
- Write a single SQL query that works with {dialect}.
- **`GROUP BY` Rule:** Any column in the `SELECT` list must either be in the `GROUP BY` clause or be used in an aggregate function (like `COUNT`, `SUM`, `AVG`, `MIN`, `MAX`).
- Dates are stored as text. To work with them use the date functions `date()` and `strftime()`, which expect the 'YYYY-MM-DD' form (for example `strftime('%m', "column_name")` or `date("column_name")`).
- Do NOT use a `LIMIT` clause unless the user explicitly asks for a specific number of results (e.g., "top 5", "the 10 biggest"). Return all relevant results ordered appropriately.
- Do NOT provide any explanation, preamble, or markdown formatting.
- Your entire response must be ONLY the SQL query.
- If you cannot generate a query, respond with 'ERROR'.

Return ONLY the SQL query or 'ERROR'."#
    )
}

/// Data-analyst prompt turning a query result into a final answer.
pub fn build_answer_prompt(question: &str, sql: &str, result_text: &str, language: &str) -> String {
    format!(
        r#"You are a helpful data analyst assistant.
Your goal is to provide a clear and professional final answer in {language} based on the data retrieved from a query.
Original User Query: "{question}"
Executed SQL Query: {sql}
Data Result:
{result_text}
Task:
Format a final response in {language} that:
1. Directly answers the user's question.
2. Is well-structured and clear.
3. Includes specific numbers from the "Data Result" to support the analysis.
4. If the result is a table, summarize the key findings. Do not just repeat the table.
Generate ONLY the final response to the user."#
    )
}
