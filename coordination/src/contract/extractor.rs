//! Contract Extractor: infer the declared HTTP surface from backend source.
//!
//! Extraction is textual. Generated code is never imported or executed.
//! [`RouteExtractor`] is the seam for swapping in an AST-based
//! implementation; [`PatternExtractor`] is the default.

use std::collections::BTreeSet;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use super::synth::synthesize_body;
use super::{carries_body, Contract, Endpoint};

/// One declared route.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteDeclaration {
    pub method: String,
    /// Parameters replaced by `1`.
    pub path: String,
    /// Path exactly as written in source.
    pub raw_path: String,
    /// Request-body fields the handler reads, sorted.
    #[serde(default)]
    pub fields: Vec<String>,
}

pub trait RouteExtractor: Send + Sync {
    /// Declared routes in source order, one per (method, path).
    fn routes(&self, source: &str) -> Vec<RouteDeclaration>;

    /// Build a contract against `base_url`. Bodies are synthesized only for
    /// body-carrying methods; every endpoint expects 200.
    fn extract(&self, source: &str, base_url: &str) -> Contract {
        let endpoints = self
            .routes(source)
            .into_iter()
            .map(|r| Endpoint {
                body: carries_body(&r.method).then(|| synthesize_body(&r.fields)),
                method: r.method,
                path: r.path,
                expect: 200,
            })
            .collect();
        Contract {
            base_url: base_url.to_string(),
            endpoints,
        }
    }
}

// Arguments run to the last `)` on the decorator line so `methods=(...)` stays intact.
static FLASK_ROUTE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?m)@\w+\.route\(\s*['"]([^'"]+)['"](.*)\)[ \t]*(?:#.*)?$"#).unwrap()
});

static FLASK_METHODS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"methods\s*=\s*[\[(]([^\])]*)[\])]").unwrap());

static DECORATOR_SHORTHAND: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"@\w+\.(get|post|put|patch|delete)\(\s*['"]([^'"]+)['"]"#).unwrap()
});

static EXPRESS_ROUTE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?m)^[ \t]*\w+\.(get|post|put|patch|delete)\(\s*['"`](/[^'"`]*)['"`]\s*,"#)
        .unwrap()
});

static QUOTED_WORD: LazyLock<Regex> = LazyLock::new(|| Regex::new(r#"['"](\w+)['"]"#).unwrap());

static TERMINATOR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?m)^\s*if\s+__name__\s*==|^\s*\w+\.listen\s*\("#).unwrap()
});

static PATH_PARAM: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<[^>]+>|\{[^}]+\}|:\w+").unwrap());

// Variables bound from the request body, e.g. `data = request.get_json()`.
static BODY_BINDING: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(\w+)\s*=\s*\(?\s*request\.(?:get_json\s*\([^)]*\)|json\b)").unwrap()
});

static MEMBERSHIP: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"['"](\w+)['"]\s+(?:not\s+)?in\s+(\w+)\b"#).unwrap());

static VAR_GET: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"\b(\w+)\.get\(\s*['"](\w+)['"]"#).unwrap());

static VAR_INDEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"\b(\w+)\[\s*['"](\w+)['"]\s*\]"#).unwrap());

static REQUEST_INDEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"request\.json\s*\[\s*['"](\w+)['"]"#).unwrap());

static REQUEST_GET: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"request\.(?:json|get_json\s*\([^)]*\))(?:\s+or\s*\{\s*\}\s*\))?\s*\.get\(\s*['"](\w+)['"]"#,
    )
    .unwrap()
});

static REQ_BODY_DOT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\breq\.body\.(\w+)").unwrap());

static REQ_BODY_INDEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"\breq\.body\[\s*['"](\w+)['"]\s*\]"#).unwrap());

static REQ_BODY_DESTRUCTURE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:const|let|var)\s*\{([^}]*)\}\s*=\s*req\.body\b").unwrap()
});

/// Replace `<int:id>`, `<id>`, `{id}` and `:id` segments with `1`.
pub fn normalize_path(raw: &str) -> String {
    PATH_PARAM.replace_all(raw, "1").into_owned()
}

/// Regex-driven extractor for Flask and Express style declarations.
#[derive(Debug, Default, Clone, Copy)]
pub struct PatternExtractor;

struct Declaration {
    start: usize,
    end: usize,
    methods: Vec<String>,
    raw_path: String,
}

impl PatternExtractor {
    fn declarations(source: &str) -> Vec<Declaration> {
        let mut decls = Vec::new();

        for caps in FLASK_ROUTE.captures_iter(source) {
            let (Some(whole), Some(path)) = (caps.get(0), caps.get(1)) else {
                continue;
            };
            let args = caps.get(2).map_or("", |m| m.as_str());
            let methods: Vec<String> = FLASK_METHODS
                .captures(args)
                .and_then(|m| m.get(1))
                .map(|list| {
                    QUOTED_WORD
                        .captures_iter(list.as_str())
                        .filter_map(|c| c.get(1))
                        .map(|m| m.as_str().to_uppercase())
                        .collect()
                })
                .unwrap_or_default();
            decls.push(Declaration {
                start: whole.start(),
                end: whole.end(),
                methods: if methods.is_empty() {
                    vec!["GET".to_string()]
                } else {
                    methods
                },
                raw_path: path.as_str().to_string(),
            });
        }

        for caps in DECORATOR_SHORTHAND.captures_iter(source) {
            let (Some(whole), Some(method), Some(path)) = (caps.get(0), caps.get(1), caps.get(2))
            else {
                continue;
            };
            decls.push(Declaration {
                start: whole.start(),
                end: whole.end(),
                methods: vec![method.as_str().to_uppercase()],
                raw_path: path.as_str().to_string(),
            });
        }

        // Decorator-style sources never mix in Express registrations; skipping
        // keeps calls like `requests.get('/x', ...)` out of Flask contracts.
        if decls.is_empty() {
            for caps in EXPRESS_ROUTE.captures_iter(source) {
                let (Some(whole), Some(method), Some(path)) =
                    (caps.get(0), caps.get(1), caps.get(2))
                else {
                    continue;
                };
                decls.push(Declaration {
                    start: whole.start(),
                    end: whole.end(),
                    methods: vec![method.as_str().to_uppercase()],
                    raw_path: path.as_str().to_string(),
                });
            }
        }

        decls.sort_by_key(|d| d.start);
        decls
    }

    /// Body fields read inside one handler.
    fn fields(handler: &str) -> Vec<String> {
        let mut bound: BTreeSet<&str> = BTreeSet::from(["data"]);
        bound.extend(
            BODY_BINDING
                .captures_iter(handler)
                .filter_map(|c| c.get(1))
                .map(|m| m.as_str()),
        );

        let mut fields = BTreeSet::new();
        let mut bound_capture = |re: &Regex, var_group: usize, key_group: usize| {
            for caps in re.captures_iter(handler) {
                if let (Some(var), Some(key)) = (caps.get(var_group), caps.get(key_group)) {
                    if bound.contains(var.as_str()) {
                        fields.insert(key.as_str().to_string());
                    }
                }
            }
        };
        bound_capture(&MEMBERSHIP, 2, 1);
        bound_capture(&VAR_GET, 1, 2);
        bound_capture(&VAR_INDEX, 1, 2);

        for re in [&*REQUEST_INDEX, &*REQUEST_GET, &*REQ_BODY_DOT, &*REQ_BODY_INDEX] {
            fields.extend(
                re.captures_iter(handler)
                    .filter_map(|c| c.get(1))
                    .map(|m| m.as_str().to_string()),
            );
        }

        for caps in REQ_BODY_DESTRUCTURE.captures_iter(handler) {
            let Some(list) = caps.get(1) else { continue };
            for item in list.as_str().split(',') {
                let name = item
                    .split([':', '='])
                    .next()
                    .map(str::trim)
                    .unwrap_or_default();
                if !name.is_empty() && name.chars().all(|c| c.is_alphanumeric() || c == '_') {
                    fields.insert(name.to_string());
                }
            }
        }

        fields.into_iter().collect()
    }
}

impl RouteExtractor for PatternExtractor {
    fn routes(&self, source: &str) -> Vec<RouteDeclaration> {
        let decls = Self::declarations(source);
        let mut seen = BTreeSet::new();
        let mut routes = Vec::new();

        for (i, decl) in decls.iter().enumerate() {
            let next = decls.get(i + 1).map_or(source.len(), |d| d.start);
            let stop = TERMINATOR
                .find_at(source, decl.end)
                .map_or(next, |m| m.start().min(next))
                .max(decl.end);
            let handler = &source[decl.end..stop];
            let fields = Self::fields(handler);
            let path = normalize_path(&decl.raw_path);

            for method in &decl.methods {
                if !seen.insert((method.clone(), path.clone())) {
                    continue;
                }
                routes.push(RouteDeclaration {
                    method: method.clone(),
                    path: path.clone(),
                    raw_path: decl.raw_path.clone(),
                    fields: fields.clone(),
                });
            }
        }

        tracing::debug!(routes = routes.len(), "routes extracted");
        routes
    }
}

/// Extract with the default [`PatternExtractor`].
pub fn extract(source: &str, base_url: &str) -> Contract {
    PatternExtractor.extract(source, base_url)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const TODO_APP: &str = r#"from flask import Flask, jsonify, request
from flask_cors import CORS

app = Flask(__name__)
CORS(app)
todos = []

@app.route('/')
def index():
    return jsonify({"status": "ok"})

@app.route('/items', methods=['GET'])
def list_items():
    return jsonify(todos)

@app.route('/add', methods=['POST'])
def add():
    data = request.get_json()
    if 'title' not in data:
        return jsonify({"error": "missing title"}), 400
    todo = {"id": len(todos) + 1, "title": data['title'], "done": data.get('done', False)}
    todos.append(todo)
    return jsonify(todo), 200

@app.route('/delete/<int:item_id>', methods=['DELETE'])
def delete(item_id):
    return jsonify({"deleted": item_id})

if __name__ == '__main__':
    app.run(port=5000)
"#;

    #[test]
    fn test_flask_routes_in_source_order() {
        let routes = PatternExtractor.routes(TODO_APP);
        let labels: Vec<String> = routes
            .iter()
            .map(|r| format!("{} {}", r.method, r.path))
            .collect();
        assert_eq!(
            labels,
            vec!["GET /", "GET /items", "POST /add", "DELETE /delete/1"]
        );
        assert_eq!(routes[3].raw_path, "/delete/<int:item_id>");
    }

    #[test]
    fn test_post_body_populates_validated_field() {
        let contract = extract(TODO_APP, "http://localhost:5000");
        let add = contract.find("POST", "/add").unwrap();
        assert_eq!(add.expect, 200);
        assert_eq!(add.body, Some(json!({"done": true, "title": "Test Item"})));
    }

    #[test]
    fn test_get_and_delete_have_no_body() {
        let contract = extract(TODO_APP, "http://localhost:5000");
        assert!(contract.find("GET", "/items").unwrap().body.is_none());
        assert!(contract.find("DELETE", "/delete/1").unwrap().body.is_none());
    }

    #[test]
    fn test_multiple_methods_and_dedup() {
        let src = "@app.route('/items', methods=['GET', 'POST'])\ndef items():\n    data = request.json\n    return data['name']\n\n@app.route('/items')\ndef again():\n    pass\n";
        let routes = PatternExtractor.routes(src);
        assert_eq!(routes.len(), 2);
        assert_eq!(routes[0].method, "GET");
        assert_eq!(routes[1].method, "POST");
        assert_eq!(routes[1].fields, vec!["name".to_string()]);
    }

    #[test]
    fn test_tuple_methods_form() {
        let src = "@app.route('/items', methods=('GET', 'POST'))\ndef items():\n    return 'ok'\n\n@app.route('/items/<int:id>', methods=('DELETE',))  # remove\ndef remove(id):\n    return 'ok'\n";
        let labels: Vec<String> = PatternExtractor
            .routes(src)
            .iter()
            .map(|r| format!("{} {}", r.method, r.path))
            .collect();
        assert_eq!(labels, vec!["GET /items", "POST /items", "DELETE /items/1"]);
    }

    #[test]
    fn test_shorthand_decorators_and_direct_request_access() {
        let src = "@app.post('/login')\ndef login():\n    email = request.json['email']\n    pw = (request.get_json() or {}).get('password')\n    return 'ok'\n";
        let routes = PatternExtractor.routes(src);
        assert_eq!(routes.len(), 1);
        assert_eq!(routes[0].fields, vec!["email".to_string(), "password".to_string()]);
    }

    #[test]
    fn test_unbound_dict_access_is_ignored() {
        let src = "@app.route('/x', methods=['POST'])\ndef x():\n    payload = request.get_json()\n    cfg = {}\n    a = cfg['secret']\n    return payload.get('title')\n";
        let routes = PatternExtractor.routes(src);
        assert_eq!(routes[0].fields, vec!["title".to_string()]);
    }

    #[test]
    fn test_express_routes() {
        let src = "const express = require('express');\nconst app = express();\napp.get('/items', (req, res) => res.json([]));\napp.post('/items', (req, res) => {\n  const { title, price } = req.body;\n  res.json({ title, price, note: req.body.note });\n});\napp.delete('/items/:id', (req, res) => res.sendStatus(200));\napp.listen(5000);\n";
        let contract = extract(src, "http://localhost:5000");
        let labels: Vec<String> = contract.endpoints.iter().map(Endpoint::label).collect();
        assert_eq!(labels, vec!["GET /items", "POST /items", "DELETE /items/1"]);
        assert_eq!(
            contract.endpoints[1].body,
            Some(json!({"note": "test", "price": 100, "title": "Test Item"}))
        );
    }

    #[test]
    fn test_normalize_path() {
        assert_eq!(normalize_path("/items/<int:id>"), "/items/1");
        assert_eq!(normalize_path("/items/<id>/tags/{tag}"), "/items/1/tags/1");
        assert_eq!(normalize_path("/users/:userId"), "/users/1");
        assert_eq!(normalize_path("/plain"), "/plain");
    }

    #[test]
    fn test_contract_round_trip_preserves_endpoints() {
        let contract = extract(TODO_APP, "http://localhost:5000");
        let json = serde_json::to_string_pretty(&contract).unwrap();
        let back: Contract = serde_json::from_str(&json).unwrap();
        assert_eq!(back, contract);
    }

    #[test]
    fn test_no_routes_yields_empty_contract() {
        assert!(extract("print('hi')\n", "http://localhost:5000").is_empty());
    }
}
