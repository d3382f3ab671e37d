// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

use crate::*;
use serde_json::json;
use std::fs;
use tempfile::TempDir;

// Helper function to create an engine over in-memory templates
fn memory_engine(templates: &[(&str, &str)]) -> Engine<MemoryResourceResolver> {
    let resolver = MemoryResourceResolver::new();
    for (path, source) in templates {
        resolver.add_template(path, *source);
    }
    Engine::with_memory_cache(resolver, 100)
}

fn render(templates: &[(&str, &str)], data: serde_json::Value) -> String {
    memory_engine(templates).compile_json("index", data).unwrap()
}

#[cfg(test)]
mod interpolation_tests {
    use super::*;

    #[test]
    fn test_text_holes_escape() {
        let data = json!({"name": "<b>"});
        assert_eq!(render(&[("index.xhtml", "{{name}}")], data.clone()), "&lt;b&gt;");
        assert_eq!(render(&[("index.xhtml", "{{{name}}}")], data), "<b>");
    }

    #[test]
    fn test_fallbacks_and_missing() {
        let data = json!({"user": {"name": null, "login": "ada"}});
        assert_eq!(
            render(&[("index.xhtml", "<p>{{user.name|user.login}}</p><i>{{nope}}</i>")], data),
            "<p>ada</p><i></i>"
        );
    }

    #[test]
    fn test_attribute_holes() {
        let data = json!({"url": "/a?b=1&c=\"2\"", "cls": ""});
        let out = render(&[("index.xhtml", "<a href=\"{{url}}\" {{class=cls}}>x</a>")], data);
        assert_eq!(out, "<a href=\"/a?b=1&amp;c=&quot;2&quot;\" >x</a>");
    }

    #[test]
    fn test_inserted_values_are_not_rescanned() {
        let data = json!({"a": "{{b}}", "b": "secret", "c": "%!v0!%"});
        assert_eq!(render(&[("index.xhtml", "{{a}}|{{c}}")], data), "{{b}}|%!v0!%");
    }

    #[test]
    fn test_literal_escape_markers_survive() {
        assert_eq!(render(&[("index.xhtml", "50%! and !%")], json!({})), "50%! and !%");
    }
}

#[cfg(test)]
mod control_flow_tests {
    use super::*;

    #[test]
    fn test_if_equality() {
        let data = json!({"x": "x"});
        assert_eq!(render(&[("index.xhtml", "<_if x = 'x'>content</_if>")], data.clone()), "content");
        assert_eq!(render(&[("index.xhtml", "<_if x = 'y'>content</_if>")], data), "");
    }

    #[test]
    fn test_if_elif_else() {
        let source = "<_if n > 5>big<_elif n > 2>mid<_else>small</_if>";
        assert_eq!(render(&[("index.xhtml", source)], json!({"n": 9})), "big");
        assert_eq!(render(&[("index.xhtml", source)], json!({"n": 3})), "mid");
        assert_eq!(render(&[("index.xhtml", source)], json!({"n": 1})), "small");
    }

    #[test]
    fn test_each_dollar_binding() {
        let data = json!({"list": ["a", "b"]});
        assert_eq!(
            render(&[("index.xhtml", "<_each list as k>item=$k </_each>")], data),
            "item=a item=b "
        );
    }

    #[test]
    fn test_each_map_bindings() {
        let data = json!({"users": {"b": 2, "a": 1}});
        let source = "<_each users as u of name in i>{{i}}:{{name}}={{u}};</_each>";
        assert_eq!(render(&[("index.xhtml", source)], data.clone()), "0:a=1;1:b=2;");
        let source = "<_each users u name i desc>{{name}}</_each>";
        assert_eq!(render(&[("index.xhtml", source)], data), "ba");
    }

    #[test]
    fn test_each_ranges() {
        let out = render(&[("index.xhtml", "<_each 1..3 as n>{{n}}</_each>")], json!({}));
        assert_eq!(out, "123");
        let out = render(&[("index.xhtml", "<_each to..from as n>{{n}}</_each>")], json!({"from": 1, "to": 3}));
        assert_eq!(out, "321");
        let out = render(&[("index.xhtml", "<_each 3 as n>{{n}}</_each>")], json!({}));
        assert_eq!(out, "012");
    }

    #[test]
    fn test_nested_each_with_if() {
        let data = json!({"rows": [{"name": "a", "on": true}, {"name": "b", "on": false}]});
        let source = "<_each rows as row><_if row.on>[{{row.name}}]<_else>({{row.name}})</_if></_each>";
        assert_eq!(render(&[("index.xhtml", source)], data), "[a](b)");
    }

    #[test]
    fn test_set_and_rand() {
        let out = render(&[("index.xhtml", "<_set greeting='hi'/>{{greeting}}")], json!({}));
        assert_eq!(out, "hi");

        let out = render(&[("index.xhtml", "<_rand id size=8/>{{id}}")], json!({}));
        assert_eq!(out.len(), 8);
        assert!(out.chars().all(|c| c.is_ascii_alphanumeric()));
    }
}

#[cfg(test)]
mod function_tests {
    use super::*;

    fn shout(ctx: &FunctionContext<'_>) -> String {
        ctx.value("0").into_value().to_string().to_uppercase()
    }

    #[test]
    fn test_json_function() {
        let data = json!({"user": {"a": 1}});
        assert_eq!(render(&[("index.xhtml", "<_json user/>")], data), "{\"a\":1}");
    }

    #[test]
    fn test_unknown_function_is_empty() {
        assert_eq!(render(&[("index.xhtml", "a<_nope x/>b")], json!({})), "ab");
    }

    #[test]
    fn test_user_function() {
        let engine = memory_engine(&[("index.xhtml", "<_shout name/>")]);
        engine.register_function("shout", shout).unwrap();
        assert!(engine.register_function("if", shout).is_err());
        assert_eq!(engine.compile_json("index", json!({"name": "ada"})).unwrap(), "ADA");
    }

    #[test]
    fn test_lorem_and_youtube() {
        let out = render(&[("index.xhtml", "<_lorem w 5/>")], json!({}));
        assert_eq!(out.len(), 5);

        let out = render(&[("index.xhtml", "<_yt dQw4w9WgXcQ/>")], json!({}));
        assert!(out.starts_with(
            "<script src=\"https://cdn.jsdelivr.net/npm/turbx/assets/youtube-embed.min.js\" defer></script>"
        ));
        assert!(out.contains("youtube-embed-client"));
    }

    #[test]
    fn test_script_and_markdown_blocks() {
        let out = render(
            &[("index.xhtml", "<script>let a = \"{{x}}\";</script><markdown># Hi</markdown>")],
            json!({"x": "no"}),
        );
        assert!(out.starts_with("<script>let a = \"{{x}}\";</script>"));
        assert!(out.contains("<h1>Hi</h1>"));
    }
}

#[cfg(test)]
mod component_tests {
    use super::*;

    #[test]
    fn test_component_with_body() {
        let out = render(
            &[
                ("index.xhtml", "<Card title=\"Hi\"><p>{{msg}}</p></Card>"),
                ("components/Card.xhtml", "<div class=\"card\"><h2>{{title}}</h2>{{body}}</div>"),
            ],
            json!({"msg": "hello"}),
        );
        assert_eq!(out, "<div class=\"card\"><h2>Hi</h2><p>hello</p></div>");
    }

    #[test]
    fn test_component_arguments() {
        let out = render(
            &[
                ("index.xhtml", "<Shop.Badge label={{user.name}} {{user}} count=3/>"),
                ("components/Shop/Badge.xhtml", "{{label}}/{{user.role}}/{{count}}/{{body}}"),
            ],
            json!({"user": {"name": "<ada>", "role": "admin"}}),
        );
        assert_eq!(out, "&lt;ada&gt;/admin/3/");
    }

    #[test]
    fn test_missing_component_is_empty() {
        assert_eq!(render(&[("index.xhtml", "a<Missing/>b")], json!({})), "ab");
    }

    #[test]
    fn test_recursion_stops() {
        let out = render(
            &[("index.xhtml", "<Loop/>"), ("components/Loop.xhtml", "x<Loop/>")],
            json!({}),
        );
        assert_eq!(out, "x".repeat(compiler::MAX_COMPONENT_DEPTH));
    }

    #[test]
    fn test_imports() {
        let templates = [
            ("index.xhtml", "<_:nav/>|<Box _noimport><_:nav/></Box>"),
            ("nav.xhtml", "<nav>N</nav>"),
            ("components/Box.xhtml", "[{{body}}<_:nav/>]"),
        ];
        assert_eq!(render(&templates, json!({"allowImport": true})), "<nav>N</nav>|[<nav>N</nav>]");
        assert_eq!(render(&templates, json!({})), "|[]");
    }
}

#[cfg(test)]
mod layout_tests {
    use super::*;

    const LAYOUT: &str = "<html><head><title>{{title}}</title></head><body><main><body/></main></body></html>";

    #[test]
    fn test_layout_merge() {
        let engine = memory_engine(&[("index.xhtml", "<p>{{title}}</p>"), ("layout.xhtml", LAYOUT)]);
        engine.set_option("template", "layout");
        let out = engine.compile_json("index", json!({"title": "T"})).unwrap();
        assert_eq!(out, "<html><head><title>T</title></head><body><main><p>T</p></main></body></html>");
    }

    #[test]
    fn test_layout_from_scope_and_meta() {
        let engine = memory_engine(&[
            ("index.xhtml", "<meta name=\"d\" content=\"x\"><p>x</p>"),
            ("layout.xhtml", LAYOUT),
        ]);
        let out = engine
            .compile_json("index", json!({"template": "layout", "title": "T"}))
            .unwrap();
        assert_eq!(
            out,
            "<html><head><meta name=\"d\" content=\"x\"><title>T</title></head><body><main><p>x</p></main></body></html>"
        );
    }

    #[test]
    fn test_component_meta_moves_to_head() {
        let engine = memory_engine(&[
            ("index.xhtml", "<Seo/><p>x</p>"),
            ("components/Seo.xhtml", "<meta name=\"d\" content=\"x\">"),
            ("layout.xhtml", "<html><head><title>T</title></head><body><BODY/></body></html>"),
        ]);
        let out = engine.compile_json("index", json!({"template": "layout"})).unwrap();
        assert_eq!(
            out,
            "<html><head><meta name=\"d\" content=\"x\"><title>T</title></head><body><p>x</p></body></html>"
        );
    }

    #[test]
    fn test_bare_marker_layout_is_idempotent() {
        let engine = memory_engine(&[("index.xhtml", "<h1>{{t}}</h1><_if t>yes</_if>"), ("bare.xhtml", "<BODY/>")]);
        let plain = engine.compile_json("index", json!({"t": "a"})).unwrap();
        let wrapped = engine
            .compile_json("index", json!({"t": "a", "template": "bare"}))
            .unwrap();
        assert_eq!(plain, wrapped);
    }

    #[test]
    fn test_missing_layout_is_skipped() {
        let out = render(&[("index.xhtml", "<p>x</p>")], json!({"template": "nope"}));
        assert_eq!(out, "<p>x</p>");
    }

    #[test]
    fn test_public_options() {
        let out = render(
            &[("index.xhtml", "<head></head><p>x</p>")],
            json!({"public": {"css": {"a": "b"}}}),
        );
        assert_eq!(out, "<head><style>:root{--a:b;}</style></head><p>x</p>");
    }
}

#[cfg(test)]
mod precompile_tests {
    use super::*;

    #[test]
    fn test_constant_folding_uses_pre_record() {
        let resolver = MemoryResourceResolver::new();
        resolver.add_template("index.xhtml", "<h1>{{site}}</h1><p>{{user}}</p>");
        let cache = MemoryCache::new(16);
        let engine = Engine::new(resolver, Box::new(cache.clone()));

        let out = engine
            .compile_json("index", json!({"const": {"site": "S"}, "user": "U"}))
            .unwrap();
        assert_eq!(out, "<h1>S</h1><p>U</p>");
        assert!(engine.has_precompiled("index"));
        assert!(cache.contains_key("index.pre"));

        let pre = cache.get("index.pre").unwrap().unwrap();
        assert_eq!(pre.html, "<h1>S</h1><p>{{user}}</p>");
    }

    #[test]
    fn test_residual_condition_matches_single_pass() {
        let engine = memory_engine(&[("index.xhtml", "<_if flag & $on>A<_else>B</_if>")]);
        for flag in [true, false] {
            let scope = scope_from_json(json!({"flag": flag, "$on": true}));
            let folded = engine.compile("index", &scope).unwrap();
            let base = engine.precompile("index").unwrap();
            let single = engine.render(&base, &scope);
            assert_eq!(folded, single);
            assert_eq!(folded, if flag { "A" } else { "B" });
        }
    }

    #[test]
    fn test_residual_if_inside_unrolled_each() {
        let engine = memory_engine(&[(
            "index.xhtml",
            "<_each $items as it><_if show>[{{it}}]<_else>-</_if></_each>",
        )]);
        for show in [true, false] {
            let data = json!({"$items": ["x", "y"], "show": show});
            let folded = engine.compile_json("index", data.clone()).unwrap();
            let base = engine.precompile("index").unwrap();
            let single = engine.render(&base, &scope_from_json(data));
            assert_eq!(folded, single);
            assert_eq!(folded, if show { "[x][y]" } else { "--" });
        }
    }

    #[test]
    fn test_folded_values_are_not_rescanned() {
        let engine = memory_engine(&[("index.xhtml", "<p>{{$site}}</p><i>{{{$raw}}}</i>")]);
        let data = json!({"$site": "{{user}}", "$raw": "<b>{{user}}</b>", "user": "U"});
        let folded = engine.compile_json("index", data.clone()).unwrap();
        assert_eq!(folded, "<p>{{user}}</p><i><b>{{user}}</b></i>");
        let base = engine.precompile("index").unwrap();
        assert_eq!(engine.render(&base, &scope_from_json(data)), folded);
    }

    #[test]
    fn test_each_unrolls_on_constants() {
        let resolver = MemoryResourceResolver::new();
        resolver.add_template("index.xhtml", "<ul><_each $items as it><li>{{it}}</li></_each></ul>");
        let cache = MemoryCache::new(16);
        let engine = Engine::new(resolver, Box::new(cache.clone()));
        let out = engine.compile_json("index", json!({"$items": ["x", "y"]})).unwrap();
        assert_eq!(out, "<ul><li>x</li><li>y</li></ul>");
        assert_eq!(cache.get("index.pre").unwrap().unwrap().html, out);
    }

    #[test]
    fn test_functions_survive_folding() {
        let engine = memory_engine(&[("index.xhtml", "<_if $on><_json user/></_if>")]);
        let out = engine
            .compile_json("index", json!({"$on": true, "user": [1]}))
            .unwrap();
        assert_eq!(out, "[1]");
    }

    #[test]
    fn test_invalidate() {
        let engine = memory_engine(&[("index.xhtml", "<p>one</p>")]);
        assert_eq!(engine.compile_json("index", json!({})).unwrap(), "<p>one</p>");
        engine.resolver().add_template("index.xhtml", "<p>two</p>");
        assert_eq!(engine.compile_json("index", json!({})).unwrap(), "<p>one</p>");
        engine.invalidate("/index.xhtml").unwrap();
        assert!(!engine.has_precompiled("index"));
        assert_eq!(engine.compile_json("index", json!({})).unwrap(), "<p>two</p>");
    }

    #[test]
    fn test_missing_page_is_an_error() {
        let engine = memory_engine(&[]);
        assert!(engine.compile_json("nope", json!({})).unwrap_err().is_not_found());
        assert!(engine.precompile("../etc/passwd").unwrap_err().is_not_found());
    }
}

#[cfg(test)]
mod filesystem_tests {
    use super::*;

    #[test]
    fn test_filesystem_engine() {
        let temp_dir = TempDir::new().unwrap();
        fs::create_dir(temp_dir.path().join("parts")).unwrap();
        fs::write(temp_dir.path().join("index.html"), "<Nav/><p>{{msg}}</p>").unwrap();
        fs::write(temp_dir.path().join("parts/Nav.html"), "<nav>home</nav>").unwrap();

        let engine = Engine::with_memory_cache(FileSystemResolver::new(), 100);
        engine.set_option("root", &resolver::path_to_string(temp_dir.path()));
        engine.set_option("ext", "html");
        engine.set_option("components", "parts");

        let out = engine.compile_json("index.html", json!({"msg": "hi"})).unwrap();
        assert_eq!(out, "<nav>home</nav><p>hi</p>");
    }

    #[test]
    fn test_missing_root() {
        let engine = Engine::with_memory_cache(FileSystemResolver::new(), 100);
        assert!(matches!(
            engine.compile_json("index", json!({})),
            Err(TurbxError::MissingRoot)
        ));
    }
}
