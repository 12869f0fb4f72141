const INSTRUCTIONS: &str = "\
You are a code quality analyzer.
Analyze the following codebase as a whole and provide:
1. A single consolidated quality score from 0 to 100 for the entire codebase, written as \"Score: <number>\".
2. Under a heading \"Improvements:\", 2-3 specific, concise, and easy-to-understand improvement suggestions for the overall codebase, one per line. Be precise and do not elaborate.
3. If the code is not optimized, you may reduce the score and mention optimization in the improvements.

Each file below starts with a header line naming its path.

Codebase:
";

pub fn build_prompt(corpus_text: &str) -> String {
    let mut prompt = String::with_capacity(INSTRUCTIONS.len() + corpus_text.len());
    prompt.push_str(INSTRUCTIONS);
    prompt.push_str(corpus_text);
    prompt
}
