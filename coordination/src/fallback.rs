//! Deterministic artifacts: scaffold templates and last-resort fallbacks.
//!
//! Scaffolds are files whose content never depends on the model (build
//! configs, entry HTML, stylesheets). Fallbacks are minimal working
//! artifacts substituted when generation and repair are exhausted; every
//! one of them passes [`validate`](crate::validator::validate).

use std::sync::LazyLock;

use regex::Regex;

use crate::validator::{file_name, ArtifactKind, ArtifactRole};

static PACKAGE_NAME: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[^a-z0-9-]").unwrap());

/// Inputs that shape template text.
#[derive(Debug, Clone)]
pub struct TemplateContext {
    pub project_goal: String,
    pub backend_port: u16,
    /// React frontend (vs. plain HTML/JS).
    pub react: bool,
}

impl Default for TemplateContext {
    fn default() -> Self {
        Self {
            project_goal: "A web application".to_string(),
            backend_port: 5000,
            react: true,
        }
    }
}

impl TemplateContext {
    fn api_base(&self) -> String {
        format!("http://localhost:{}", self.backend_port)
    }

    fn package_name(&self) -> String {
        let lower: String = self.project_goal.to_lowercase().chars().take(30).collect();
        let name = PACKAGE_NAME.replace_all(&lower, "-");
        let name = name.trim_matches('-');
        if name.is_empty() {
            "app".to_string()
        } else {
            name.to_string()
        }
    }

    fn title(&self) -> String {
        let title: String = self.project_goal.chars().take(50).collect();
        if title.trim().is_empty() {
            "Web Application".to_string()
        } else {
            title
        }
    }
}

/// Whether `path` is produced from a template instead of the model.
pub fn is_scaffold(path: &str) -> bool {
    let name = file_name(path);
    name == "package.json"
        || name == "requirements.txt"
        || name.ends_with(".html")
        || name.ends_with(".css")
        || name.starts_with("vite.config")
        || name == "main.jsx"
        || name == "main.tsx"
}

/// Template content for a scaffold path, `None` for model-generated paths.
pub fn scaffold(path: &str, ctx: &TemplateContext) -> Option<String> {
    if !is_scaffold(path) {
        return None;
    }
    let name = file_name(path);
    let text = if name == "package.json" {
        if path.starts_with("backend/") {
            BACKEND_PACKAGE_JSON.replace("__NAME__", &ctx.package_name())
        } else {
            FRONTEND_PACKAGE_JSON.replace("__NAME__", &ctx.package_name())
        }
    } else if name == "requirements.txt" {
        REQUIREMENTS_TXT.to_string()
    } else if name.ends_with(".html") {
        let body = if ctx.react { REACT_HTML } else { VANILLA_HTML };
        body.replace("__TITLE__", &ctx.title())
    } else if name.ends_with(".css") {
        STYLESHEET.to_string()
    } else if name.starts_with("vite.config") {
        VITE_CONFIG.to_string()
    } else {
        MAIN_JSX.to_string()
    };
    Some(text)
}

/// Minimal working artifact for any path. Total.
pub fn fallback(path: &str, ctx: &TemplateContext) -> String {
    if let Some(text) = scaffold(path, ctx) {
        return text;
    }
    let port = ctx.backend_port.to_string();
    match ArtifactRole::detect(path) {
        ArtifactRole::FlaskBackend => return FLASK_APP.replace("__PORT__", &port),
        ArtifactRole::ExpressBackend => return EXPRESS_APP.replace("__PORT__", &port),
        ArtifactRole::RootComponent => return APP_COMPONENT.replace("__API__", &ctx.api_base()),
        ArtifactRole::Module => {}
    }
    match ArtifactKind::from_path(path) {
        ArtifactKind::Python => PYTHON_MODULE.to_string(),
        ArtifactKind::Component => {
            COMPONENT_MODULE.replace("__NAME__", &component_name(path))
        }
        ArtifactKind::Script if ctx.react || path.starts_with("backend/") => {
            SCRIPT_MODULE.to_string()
        }
        ArtifactKind::Script => VANILLA_SCRIPT.replace("__API__", &ctx.api_base()),
        ArtifactKind::Json => "{}\n".to_string(),
        ArtifactKind::Stylesheet => STYLESHEET.to_string(),
        ArtifactKind::Text => format!(
            "{}\n\nPlaceholder generated for: {}\n",
            file_name(path),
            ctx.title()
        ),
    }
}

fn component_name(path: &str) -> String {
    let stem = file_name(path).split('.').next().unwrap_or_default();
    let valid = stem.chars().next().is_some_and(|c| c.is_ascii_uppercase())
        && stem.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
    if valid {
        stem.to_string()
    } else {
        "Component".to_string()
    }
}

const FLASK_APP: &str = r#"from flask import Flask, jsonify, request
from flask_cors import CORS

app = Flask(__name__)
CORS(app)

items = []
next_id = 1


@app.route('/', methods=['GET'])
def index():
    return jsonify({"status": "ok"})


@app.route('/health', methods=['GET'])
def health():
    return jsonify({"status": "healthy"})


@app.route('/items', methods=['GET'])
def list_items():
    return jsonify(items)


@app.route('/add', methods=['POST'])
def add_item():
    global next_id
    data = request.get_json(silent=True) or {}
    item = {"id": next_id, **data}
    next_id += 1
    items.append(item)
    return jsonify(item), 200


@app.route('/delete/<int:item_id>', methods=['DELETE'])
def delete_item(item_id):
    global items
    items = [i for i in items if i.get("id") != item_id]
    return jsonify({"deleted": item_id}), 200


if __name__ == '__main__':
    app.run(host='0.0.0.0', port=__PORT__, debug=False)
"#;

const EXPRESS_APP: &str = r#"const express = require('express');
const cors = require('cors');

const app = express();
app.use(cors());
app.use(express.json());

let items = [];
let nextId = 1;

app.get('/', (req, res) => res.json({ status: 'ok' }));

app.get('/health', (req, res) => res.json({ status: 'healthy' }));

app.get('/items', (req, res) => res.json(items));

app.post('/add', (req, res) => {
  const item = { id: nextId++, ...(req.body || {}) };
  items.push(item);
  res.status(200).json(item);
});

app.delete('/delete/:id', (req, res) => {
  const id = Number(req.params.id);
  items = items.filter((i) => i.id !== id);
  res.status(200).json({ deleted: id });
});

app.listen(process.env.PORT || __PORT__, () => {
  console.log('listening');
});
"#;

const APP_COMPONENT: &str = r#"import React, { useEffect, useState } from 'react';
import axios from 'axios';

const API = '__API__';

function App() {
  const [items, setItems] = useState([]);
  const [title, setTitle] = useState('');
  const [message, setMessage] = useState('');

  const fetchItems = async () => {
    try {
      const response = await axios.get(`${API}/items`);
      setItems(response.data || []);
    } catch (error) {
      setMessage('Error loading items');
    }
  };

  useEffect(() => {
    fetchItems();
  }, []);

  const handleAdd = async (e) => {
    e.preventDefault();
    try {
      await axios.post(`${API}/add`, { title });
      setTitle('');
      fetchItems();
    } catch (error) {
      setMessage('Error adding item');
    }
  };

  const handleDelete = async (id) => {
    try {
      await axios.delete(`${API}/delete/${id}`);
      fetchItems();
    } catch (error) {
      setMessage('Error deleting item');
    }
  };

  return (
    <div style={{ padding: '20px', fontFamily: 'Arial, sans-serif', maxWidth: '800px', margin: '0 auto' }}>
      <h1>Items</h1>
      {message && <p>{message}</p>}
      <form onSubmit={handleAdd}>
        <input value={title} onChange={(e) => setTitle(e.target.value)} placeholder="Title" required />
        <button type="submit">Add</button>
      </form>
      <ul>
        {items.map((item) => (
          <li key={item.id}>
            {item.title || 'Untitled'}
            <button onClick={() => handleDelete(item.id)}>Delete</button>
          </li>
        ))}
      </ul>
    </div>
  );
}

export default App;
"#;

const PYTHON_MODULE: &str = r#""""Placeholder module."""


def placeholder():
    return None
"#;

const COMPONENT_MODULE: &str = r#"import React from 'react';

function __NAME__() {
  return <div className="__NAME__" />;
}

export default __NAME__;
"#;

const SCRIPT_MODULE: &str = "// placeholder module\nexport default {};\n";

const VANILLA_SCRIPT: &str = r#"const API = '__API__';

async function loadItems() {
  const list = document.getElementById('items');
  if (!list) {
    return;
  }
  try {
    const response = await fetch(`${API}/items`);
    const items = await response.json();
    list.innerHTML = items.map((i) => `<li>${i.title || 'Untitled'}</li>`).join('');
  } catch (error) {
    list.innerHTML = '<li>Error loading items</li>';
  }
}

document.addEventListener('DOMContentLoaded', loadItems);
"#;

const MAIN_JSX: &str = r#"import React from 'react';
import ReactDOM from 'react-dom/client';
import App from './App.jsx';

ReactDOM.createRoot(document.getElementById('root')).render(
  <React.StrictMode>
    <App />
  </React.StrictMode>
);
"#;

const VITE_CONFIG: &str = r#"import { defineConfig } from 'vite';
import react from '@vitejs/plugin-react';

export default defineConfig({
  plugins: [react()],
  server: {
    host: '0.0.0.0',
    port: 5173
  }
});
"#;

const REACT_HTML: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>__TITLE__</title>
</head>
<body>
    <div id="root"></div>
    <script type="module" src="/src/main.jsx"></script>
</body>
</html>
"#;

const VANILLA_HTML: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>__TITLE__</title>
    <link rel="stylesheet" href="style.css">
</head>
<body>
    <h1>__TITLE__</h1>
    <ul id="items"></ul>
    <script src="script.js"></script>
</body>
</html>
"#;

const STYLESHEET: &str = r#"* {
  margin: 0;
  padding: 0;
  box-sizing: border-box;
}

body {
  font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, sans-serif;
  background: linear-gradient(135deg, #667eea 0%, #764ba2 100%);
  min-height: 100vh;
  padding: 20px;
}

#root {
  max-width: 900px;
  margin: 0 auto;
}
"#;

const FRONTEND_PACKAGE_JSON: &str = r#"{
  "name": "__NAME__",
  "private": true,
  "version": "1.0.0",
  "type": "module",
  "scripts": {
    "dev": "vite",
    "build": "vite build",
    "preview": "vite preview"
  },
  "dependencies": {
    "react": "^18.2.0",
    "react-dom": "^18.2.0",
    "axios": "^1.6.0"
  },
  "devDependencies": {
    "vite": "^5.0.0",
    "@vitejs/plugin-react": "^4.2.0"
  }
}
"#;

const BACKEND_PACKAGE_JSON: &str = r#"{
  "name": "__NAME__-backend",
  "private": true,
  "version": "1.0.0",
  "main": "server.js",
  "scripts": {
    "start": "node server.js"
  },
  "dependencies": {
    "cors": "^2.8.5",
    "express": "^4.18.2"
  }
}
"#;

const REQUIREMENTS_TXT: &str = "flask==3.0.0\nflask-cors==4.0.0\n";

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contract::extractor::extract;
    use crate::validator::validate;

    const PATHS: [&str; 16] = [
        "backend/app.py",
        "backend/server.js",
        "backend/models.py",
        "backend/requirements.txt",
        "backend/package.json",
        "frontend/package.json",
        "frontend/index.html",
        "frontend/vite.config.js",
        "frontend/src/main.jsx",
        "frontend/src/App.jsx",
        "frontend/src/App.css",
        "frontend/src/TodoList.jsx",
        "frontend/src/api.js",
        "frontend/src/data.json",
        "frontend/README.md",
        "frontend/src/util.ts",
    ];

    #[test]
    fn test_every_fallback_validates() {
        let ctx = TemplateContext::default();
        for path in PATHS {
            let text = fallback(path, &ctx);
            let report = validate(&text, path);
            assert!(report.complete, "{path}: {:?}", report.issues);
        }
    }

    #[test]
    fn test_vanilla_fallbacks_validate() {
        let ctx = TemplateContext {
            react: false,
            ..TemplateContext::default()
        };
        for path in ["frontend/index.html", "frontend/script.js", "frontend/style.css"] {
            let report = validate(&fallback(path, &ctx), path);
            assert!(report.complete, "{path}: {:?}", report.issues);
        }
    }

    #[test]
    fn test_flask_fallback_surface() {
        let text = fallback("backend/app.py", &TemplateContext::default());
        assert!(text.contains("CORS(app)"));
        let contract = extract(&text, "http://localhost:5000");
        let labels: Vec<String> = contract.endpoints.iter().map(|e| e.label()).collect();
        assert_eq!(
            labels,
            vec!["GET /", "GET /health", "GET /items", "POST /add", "DELETE /delete/1"]
        );
    }

    #[test]
    fn test_scaffold_detection() {
        assert!(is_scaffold("frontend/package.json"));
        assert!(is_scaffold("frontend/vite.config.ts"));
        assert!(is_scaffold("frontend/src/main.jsx"));
        assert!(!is_scaffold("frontend/src/App.jsx"));
        assert!(!is_scaffold("backend/app.py"));
        assert!(scaffold("backend/app.py", &TemplateContext::default()).is_none());
    }

    #[test]
    fn test_package_name_sanitized() {
        let ctx = TemplateContext {
            project_goal: "My Todo App!".into(),
            ..TemplateContext::default()
        };
        let pkg = scaffold("frontend/package.json", &ctx).unwrap();
        assert!(pkg.contains("\"name\": \"my-todo-app\""));

        let ctx = TemplateContext {
            project_goal: "Todo list with tags and dates, please".into(),
            ..TemplateContext::default()
        };
        let pkg = scaffold("frontend/package.json", &ctx).unwrap();
        assert!(pkg.contains("\"name\": \"todo-list-with-tags-and-dates\""));

        let ctx = TemplateContext {
            project_goal: "!!!".into(),
            ..TemplateContext::default()
        };
        let pkg = scaffold("frontend/package.json", &ctx).unwrap();
        assert!(pkg.contains("\"name\": \"app\""));
    }

    #[test]
    fn test_port_substituted() {
        let ctx = TemplateContext {
            backend_port: 8080,
            ..TemplateContext::default()
        };
        assert!(fallback("backend/app.py", &ctx).contains("port=8080"));
        assert!(fallback("frontend/src/App.jsx", &ctx).contains("http://localhost:8080"));
    }
}
