pub fn render_schema() -> String {
	expand_includes(include_str!("../sql/init.sql"))
}

/// The pgvector half of the schema. Kept apart so a database without the extension still gets
/// the catalogue and cache tables.
pub fn render_vector_schema(vector_dim: u32) -> String {
	let expanded = expand_includes(include_str!("../sql/vector.sql"));

	expanded.replace("<VECTOR_DIM>", &vector_dim.to_string())
}

fn expand_includes(sql: &str) -> String {
	let mut out = String::new();

	for line in sql.lines() {
		let trimmed = line.trim();

		if let Some(path) = trimmed.strip_prefix("\\ir ") {
			match path.trim() {
				"00_extensions.sql" => out.push_str(include_str!("../sql/00_extensions.sql")),
				"functions/001_parsers.sql" =>
					out.push_str(include_str!("../sql/functions/001_parsers.sql")),
				"tables/001_gwas_catalog.sql" =>
					out.push_str(include_str!("../sql/tables/001_gwas_catalog.sql")),
				"tables/002_embedding_cache.sql" =>
					out.push_str(include_str!("../sql/tables/002_embedding_cache.sql")),
				"tables/003_study_embeddings.sql" =>
					out.push_str(include_str!("../sql/tables/003_study_embeddings.sql")),
				_ => out.push_str(line),
			}
		} else {
			out.push_str(line);
		}

		out.push('\n');
	}

	out
}
