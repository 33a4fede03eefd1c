//! I/O-type classification (§4.3): a relation is `input`, `output`,
//! `printsize`, or `internal`, derived from the directives attached to it
//! (see [`crate::io`]). A relation with no directive at all is internal.

use crate::ast::IoType;
use std::collections::HashMap;

/// `directives` maps a relation name to the set of per-statement directive
/// maps declared for it (a relation may have more than one I/O statement,
/// e.g. both an `input` and an `output` directive).
pub fn classify(directives: &HashMap<String, Vec<HashMap<String, String>>>) -> HashMap<String, Vec<IoType>> {
    let mut out = HashMap::new();
    for (relation, stmts) in directives {
        let mut kinds = Vec::new();
        for stmt in stmts {
            match stmt.get("operation").map(String::as_str) {
                Some("input") => kinds.push(IoType::Input),
                Some("output") => kinds.push(IoType::Output),
                Some("printsize") => kinds.push(IoType::PrintSize),
                _ => {}
            }
        }
        if kinds.is_empty() {
            kinds.push(IoType::Internal);
        }
        out.insert(relation.clone(), kinds);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relation_with_no_directive_classifies_internal() {
        let directives = HashMap::new();
        let result = classify(&directives);
        assert!(result.is_empty());
    }

    #[test]
    fn relation_with_input_and_output_directives_gets_both() {
        let mut directives = HashMap::new();
        directives.insert(
            "p".to_string(),
            vec![
                HashMap::from([("operation".to_string(), "input".to_string())]),
                HashMap::from([("operation".to_string(), "output".to_string())]),
            ],
        );
        let result = classify(&directives);
        assert_eq!(result["p"], vec![IoType::Input, IoType::Output]);
    }
}
