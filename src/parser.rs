//! Parse `.usbd` source into AST using PEST.

use crate::ast::*;
use pest::Parser;
use pest_derive::Parser as PestParser;

#[derive(PestParser)]
#[grammar = "grammar.pest"]
struct UsbdParser;

/// Parse a description into its statement tree.
pub fn parse(source: &str) -> Result<Document, String> {
    let pairs = UsbdParser::parse(Rule::document, source).map_err(|e| format!("Parse error: {}", e))?;
    let pair = pairs.into_iter().next().ok_or("Empty parse")?;
    build_document(pair)
}

fn build_document(pair: pest::iterators::Pair<Rule>) -> Result<Document, String> {
    let mut statements = Vec::new();
    for inner in pair.into_inner() {
        if inner.as_rule() == Rule::statement {
            statements.push(build_statement(inner)?);
        }
    }
    Ok(Document { statements })
}

fn build_statement(pair: pest::iterators::Pair<Rule>) -> Result<Statement, String> {
    let line = pair.as_span().start_pos().line_col().0;
    let mut inner = pair.into_inner();
    let keyword = inner.next().ok_or("statement: keyword")?.as_str().to_string();
    let mut args = Vec::new();
    let mut body = None;
    for p in inner {
        match p.as_rule() {
            Rule::block => {
                let mut children = Vec::new();
                for child in p.into_inner() {
                    children.push(build_statement(child)?);
                }
                body = Some(children);
            }
            _ => args.push(parse_literal(p)?),
        }
    }
    Ok(Statement { keyword, args, body, line })
}

fn parse_literal(pair: pest::iterators::Pair<Rule>) -> Result<Literal, String> {
    let s = pair.as_str();
    match pair.as_rule() {
        Rule::hex => {
            let digits: String = s[2..].chars().filter(|c| *c != '_' && *c != '\'').collect();
            u64::from_str_radix(&digits, 16)
                .map(Literal::Hex)
                .map_err(|_| format!("hex literal out of range: {}", s))
        }
        Rule::int => s
            .parse::<i64>()
            .map(Literal::Int)
            .map_err(|_| format!("integer literal out of range: {}", s)),
        Rule::string => {
            let inner = &s[1..s.len() - 1];
            let unescaped = inner.replace("\\\"", "\"").replace("\\\\", "\\");
            Ok(Literal::String(unescaped))
        }
        Rule::ident => Ok(Literal::Ident(s.to_string())),
        other => Err(format!("unexpected {:?}", other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statements_and_blocks() {
        let doc = parse("device { bcdUSB 0x0200; }\nreport kbd { Push; }").expect("parse");
        assert_eq!(doc.statements.len(), 2);
        let dev = &doc.statements[0];
        assert_eq!(dev.keyword, "device");
        assert_eq!(dev.children()[0].args, vec![Literal::Hex(0x200)]);
        assert_eq!(doc.statements[1].args, vec![Literal::Ident("kbd".into())]);
        assert_eq!(doc.statements[1].line, 2);
    }

    #[test]
    fn literal_forms() {
        let doc = parse(r#"x -1 0x02'00 0xFF_FF "a \"b\"" in;"#).expect("parse");
        assert_eq!(
            doc.statements[0].args,
            vec![
                Literal::Int(-1),
                Literal::Hex(0x0200),
                Literal::Hex(0xFFFF),
                Literal::String("a \"b\"".into()),
                Literal::Ident("in".into()),
            ]
        );
        assert!(!doc.statements[0].is_block());
    }

    #[test]
    fn comments_are_skipped() {
        let doc = parse("// line\n/* block\n */ a; // trailing\n").expect("parse");
        assert_eq!(doc.statements.len(), 1);
    }

    #[test]
    fn errors_are_reported() {
        assert!(parse("device {").is_err());
        assert!(parse("device").is_err());
        assert!(parse("x 0xFFFFFFFFFFFFFFFFFF;").is_err());
    }
}
