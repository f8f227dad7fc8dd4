//! End-to-end rendering tests: template source in, rendered text out.

use std::path::Path;
use std::sync::{Arc, Mutex};

use serde_json::{Value, json};
use stencil_engine::{EngineError, Environment, Template, VARIADIC};

fn render(template: &str, data: Value) -> String {
    let mut env = Environment::new();
    env.set_dry_run(true);
    env.render_source(template, &data)
        .unwrap_or_else(|err| panic!("render failed: {err}"))
}

fn render_err(template: &str, data: Value) -> EngineError {
    let mut env = Environment::new();
    env.set_dry_run(true);
    env.render_source(template, &data)
        .expect_err("render should have failed")
}

#[test]
fn literal_passthrough() {
    assert_eq!(render("Simple text", json!({})), "Simple text");
}

#[test]
fn dotted_lookups_and_mixed_scalars() {
    let output = render(
        "Title: {{ title }}\nAge: {{ person.age }}\nSalary: {{ salary }}\n",
        json!({"title": "Information", "salary": 12.34, "person": {"age": 50}}),
    );
    assert_eq!(output, "Title: Information\nAge: 50\nSalary: 12.34\n");
}

#[test]
fn deep_dotted_lookups() {
    let output = render(
        "Address: {{ person.address.zipcode }} {{ person.address.city }}, {{ person.address.country }}\n",
        json!({"person": {"address": {"country": "Georgia", "city": "Kutaisi", "zipcode": 123456}}}),
    );
    assert_eq!(output, "Address: 123456 Kutaisi, Georgia\n");
}

#[test]
fn array_for_loop_with_loop_frame() {
    let output = render(
        "## for g in guests\n  {{ loop.index1 }}: {{ g }}\n## endfor\n",
        json!({"guests": ["Jeff", "Tom", "Patrick"]}),
    );
    assert_eq!(output, "  1: Jeff\n  2: Tom\n  3: Patrick\n");
}

#[test]
fn loop_frame_flags() {
    let output = render(
        "## for g in guests\n{{ loop.index }}/{{ loop.is_first }}/{{ loop.is_last }}\n## endfor\n",
        json!({"guests": ["a", "b", "c"]}),
    );
    assert_eq!(output, "0/1/0\n1/0/0\n2/0/1\n");
}

#[test]
fn object_for_loop_preserves_insertion_order() {
    let output = render(
        "Information:\n## for field, value in person\n{{ field }}: {{ value }}\n## endfor\n",
        json!({"person": {"name": "Alex", "nickname": "Merz", "age": 50, "address": "World"}}),
    );
    assert_eq!(
        output,
        "Information:\nname: Alex\nnickname: Merz\nage: 50\naddress: World\n"
    );
}

#[test]
fn nested_loops_expose_parent_frames() {
    let output = render(
        "## for country in countries\n##     for city in country.cities\n\
         {{ loop.parent.index1 }}.{{ loop.index }} {{ country.name }} {{ city }}\n\
         ##     endfor\n## endfor\n",
        json!({"countries": [
            {"name": "Georgia", "cities": ["Tbilisi", "Kutaisi"]},
            {"name": "USA", "cities": ["Boston"]},
        ]}),
    );
    assert_eq!(
        output,
        "1.0 Georgia Tbilisi\n1.1 Georgia Kutaisi\n2.0 USA Boston\n"
    );
}

#[test]
fn if_else_if_else_chain() {
    let output = render(
        "{% set numbers = [42, 151, 125] -%}\n\
         ## for n in numbers\n\
         ## if n < 100\n{{n}} < 100\n\
         ## else if n >= 150\n{{n}} >= 150\n\
         ## else\n{{n}} mid\n\
         ## endif\n\
         ## endfor\n",
        json!({}),
    );
    assert_eq!(output, "42 < 100\n151 >= 150\n125 mid\n");
}

#[test]
fn arithmetic_with_precedence() {
    let output = render("{{ 10 + 10 * 100 }}|{{ 10 ^ 3 }}|{{ 10 % 3 }}", json!({}));
    assert_eq!(output, "1010|1000|1");
}

#[test]
fn integer_and_float_arithmetic() {
    let output = render(
        "{% set number = 10 -%}\n{{ number + 10 }} {{ number - 10 }} {{ number / 10 }} {{ number * 10 }}\n\
         {% set number = 10.5 -%}\n{{ number + 10 }} {{ number - 10 }} {{ number * 10 }}\n\
         {% set string = \"Hello\" -%}\n{{ string + \" World!\" }}\n",
        json!({}),
    );
    assert_eq!(output, "20 0 1 100\n20.5 0.5 105\nHello World!\n");
}

#[test]
fn numeric_predicates_and_rounding() {
    let output = render(
        "{{ odd(42) }} {{ even(42) }} {{ divisibleBy(42, 7) }} {{ max([1, 2, 3]) }} \
         {{ min([-2.4, -1.2, 4.5]) }} {{ round(3.1415, 0) }} {{ round(3.1415, 3) }} \
         {{ int(\"2\") == 2 }} {{ float(\"1.8\") > 2 }}",
        json!({}),
    );
    assert_eq!(output, "0 1 1 3 -2.4 3 3.142 1 0");
}

#[test]
fn set_statement_writes_dotted_keys_into_the_scope() {
    let output = render(
        "{% set new_hour = 23 %}{{ new_hour }}pm\n{% set time.start = 18 %}{{ time.start }}pm\n",
        json!({}),
    );
    assert_eq!(output, "23pm\n18pm\n");
}

#[test]
fn access_functions() {
    let data = json!({"company": {
        "name": "MASH",
        "page": 42,
        "salary": 12.34,
        "persons": ["Alex", "Dima", "Georgiy"],
    }});
    let output = render(
        "{% set field = \"name\" -%}\n\
         {{ at(company, field) }}\n\
         {{ at(company, \"salary\") }}\n\
         {% set index = 1 -%}\n\
         {{ at(company.persons, index) }}\n\
         {{ exists(\"company.address\") }}\n\
         {{ exists(\"company.name\") }}\n\
         {{ existsIn(company, field) }}\n\
         {{ existsIn(company, \"test\") }}\n\
         {{ default(company.name, \"test\") }}\n\
         {{ default(company.lastname, \"test\") }}\n",
        data,
    );
    assert_eq!(output, "MASH\n12.34\nDima\n0\n1\n1\n0\nMASH\ntest\n");
}

#[test]
fn exists_probes_user_data_only() {
    // a `set` binding lives in the auxiliary scope, which exists() ignores
    let output = render(
        "{% set a.b = 1 %}{{ exists(\"a.b\") }}{{ existsIn(a, \"b\") }}",
        json!({}),
    );
    assert_eq!(output, "01");
}

#[test]
fn array_functions() {
    let data = json!({
        "persons": ["Alex", "Dima", "Georgiy", "Misha", "Anna", "Tanya"],
        "persons_str": "Alex, Dima, Anna",
    });
    let output = render(
        "{{ first(persons) }}\n{{ last(persons) }}\n{{ length(persons) }}\n\
         {{ sort(persons) }}\n{{ join(persons, \" - \") }}\n{{ split(persons_str, \", \") }}\n",
        data,
    );
    assert_eq!(
        output,
        "Alex\nTanya\n6\n\
         [\"Alex\",\"Anna\",\"Dima\",\"Georgiy\",\"Misha\",\"Tanya\"]\n\
         Alex - Dima - Georgiy - Misha - Anna - Tanya\n\
         [\"Alex\",\"Dima\",\"Anna\"]\n"
    );
}

#[test]
fn range_drives_loops() {
    let output = render(
        "{% for i in range(4) %}{{ loop.index1 }}:{{ i }}\n{% endfor %}",
        json!({}),
    );
    assert_eq!(output, "1:0\n2:1\n3:2\n4:3\n");
}

#[test]
fn string_functions() {
    let output = render(
        "{{ upper(at(persons, 0)) }}\n{{ lower(at(persons, 1)) }}\n{{ length(\"héllo\") }}\n",
        json!({"persons": ["Alex", "DIMA"]}),
    );
    assert_eq!(output, "ALEX\ndima\n5\n");
}

#[test]
fn type_predicates() {
    let data = json!({"company": {
        "name": "Microsoft",
        "code": 123,
        "price": 43.33,
        "check": true,
        "persons": ["Alex"],
    }});
    let output = render(
        "{{ isObject(company) }}{{ isString(company.name) }}{{ isNumber(company.name) }}\
         {{ isNumber(company.price) }}{{ isFloat(company.price) }}{{ isBoolean(company.check) }}\
         {{ isInteger(company.code) }}{{ isArray(company.persons) }}",
        data,
    );
    assert_eq!(output, "11011111");
}

#[test]
fn membership_operator() {
    let output = render(
        "{{ 2 in [1, 2, 3] }}{{ \"x\" in [\"a\", \"b\"] }}{{ 5 in numbers }}",
        json!({"numbers": [4, 5]}),
    );
    assert_eq!(output, "101");
}

#[test]
fn membership_needs_an_array() {
    let err = render_err("{{ 1 in 2 }}", json!({}));
    assert!(matches!(err, EngineError::Render { .. }));
}

#[test]
fn logic_operators_short_circuit_and_truthiness() {
    let output = render(
        "{{ variable }}\n\
         {% if variable %}declared{% else %}undeclared{% endif %}\n\
         {% if not variable %}undeclared{% else %}declared{% endif %}\n\
         {{ missing and missing.deep }}{{ true or missing }}\n",
        json!({}),
    );
    assert_eq!(output, "\nundeclared\nundeclared\n01\n");
}

#[test]
fn strict_mode_reports_unresolved_variables() {
    let mut env = Environment::new();
    env.set_strict(true);
    let err = env
        .render_source("{{ variable }}", &json!({}))
        .expect_err("strict render should fail");
    let EngineError::Render { msg, .. } = err else {
        panic!("expected a render error, got {err}");
    };
    assert!(msg.contains("variable 'variable' not found"));
}

#[test]
fn division_by_zero_is_a_render_error() {
    assert!(matches!(
        render_err("{{ 1 / 0 }}", json!({})),
        EngineError::Render { .. }
    ));
    assert!(matches!(
        render_err("{{ 1 % 0 }}", json!({})),
        EngineError::Render { .. }
    ));
}

#[test]
fn operator_type_mismatches_are_render_errors() {
    assert!(render_err("{{ 1 + [2] }}", json!({})).to_string().contains("'+'"));
    assert!(render_err("{{ \"a\" < 1 }}", json!({})).to_string().contains("'<'"));
    assert!(matches!(
        render_err("{{ sort([1, \"a\"]) }}", json!({})),
        EngineError::Render { .. }
    ));
    assert!(matches!(
        render_err("{{ first(42) }}", json!({})),
        EngineError::Render { .. }
    ));
}

#[test]
fn for_loop_requires_matching_container_kinds() {
    assert!(matches!(
        render_err("## for x in value\n## endfor\n", json!({"value": 42})),
        EngineError::Render { .. }
    ));
    assert!(matches!(
        render_err("## for k, v in value\n## endfor\n", json!({"value": [1]})),
        EngineError::Render { .. }
    ));
}

#[test]
fn whitespace_trim_variants() {
    let output = render("Hello   {%- if true -%}   X   {%- endif -%}   !", json!({}));
    assert_eq!(output, "HelloX!");

    let output = render("a   {#- note -#}   b", json!({}));
    assert_eq!(output, "ab");
}

#[test]
fn comments_produce_no_output() {
    assert_eq!(render("a{# hidden #}b", json!({})), "ab");
}

#[test]
fn file_statement_dry_run() {
    let output = render("{% file \"f.txt\" %}x{% endfile %}", json!({}));
    assert_eq!(
        output,
        ">>>>>> Start file: \"f.txt\"\nx<<<<<< End file: \"f.txt\"\n"
    );
}

#[test]
fn file_statements_inside_loops_dry_run() {
    let output = render(
        "{% for person in company.persons %}\
         {% file company.name + \"/\" + person + \".tbl\" %}\
         {{ loop.index }}:{{ person }}\n\
         {% endfile %}{% endfor %}",
        json!({"company": {"name": "Microsoft", "persons": ["Alex", "Dima"]}}),
    );
    assert_eq!(
        output,
        ">>>>>> Start file: \"Microsoft/Alex.tbl\"\n0:Alex\n<<<<<< End file: \"Microsoft/Alex.tbl\"\n\
         >>>>>> Start file: \"Microsoft/Dima.tbl\"\n1:Dima\n<<<<<< End file: \"Microsoft/Dima.tbl\"\n"
    );
}

#[test]
fn file_statement_writes_real_files() {
    let dir = tempfile::tempdir().expect("create temp dir");
    let mut env = Environment::new();
    env.set_output_dir(dir.path());

    let output = env
        .render_source(
            "{% file company.name + \".txt\" %}{{ company.name }}\n{% endfile %}\
             {% for person in company.persons %}\
             {% file company.name + \"\\\\\" + person + \".tbl\" %}\
             {{ loop.index }}:{{ person }}\n\
             {% endfile %}{% endfor %}",
            &json!({"company": {"name": "Microsoft", "persons": ["Alex", "Dima", "Vitaly"]}}),
        )
        .unwrap();
    // everything went into files, nothing to stdout
    assert_eq!(output, "");

    let read = |rel: &str| std::fs::read_to_string(dir.path().join(rel)).unwrap();
    assert_eq!(read("Microsoft.txt"), "Microsoft\n");
    assert_eq!(read("Microsoft/Alex.tbl"), "0:Alex\n");
    assert_eq!(read("Microsoft/Dima.tbl"), "1:Dima\n");
    assert_eq!(read("Microsoft/Vitaly.tbl"), "2:Vitaly\n");
}

#[test]
fn apply_template_expands_arrays() {
    let mut env = Environment::new();
    env.set_parse_nested_template(false);
    env.set_include_callback(Box::new(|_, name| {
        (name == "Item").then(|| Template::new("[{{loop.index1}}={{name}}]"))
    }));
    let output = env
        .render_source(
            "## apply-template Item xs\n",
            &json!({"xs": [{"name": "a"}, {"name": "b"}]}),
        )
        .unwrap();
    assert_eq!(output, "[1=a][2=b]");
}

#[test]
fn apply_template_renders_single_objects_once() {
    let mut env = Environment::new();
    env.set_parse_nested_template(false);
    env.set_include_callback(Box::new(|_, name| {
        (name == "Owner").then(|| Template::new("<{{ name }}>"))
    }));
    let output = env
        .render_source("## apply-template Owner owner\n", &json!({"owner": {"name": "o"}}))
        .unwrap();
    assert_eq!(output, "<o>");
}

#[test]
fn apply_template_skips_missing_fields() {
    let mut env = Environment::new();
    env.set_parse_nested_template(false);
    env.set_include_callback(Box::new(|_, name| {
        (name == "Item").then(|| Template::new("never"))
    }));
    let output = env
        .render_source("## apply-template Item xs\n", &json!({}))
        .unwrap();
    assert_eq!(output, "");
}

#[test]
fn apply_template_missing_template_policy() {
    let mut env = Environment::new();
    env.set_parse_nested_template(false);
    let err = env
        .render_source("## apply-template Nope xs\n", &json!({"xs": [1]}))
        .expect_err("missing template should fail");
    assert!(err.to_string().contains("apply template 'Nope' not found"));

    let mut env = Environment::new();
    env.set_parse_nested_template(false);
    env.set_throw_at_missing_includes(false);
    let output = env
        .render_source("## apply-template Nope xs\n", &json!({"xs": [1]}))
        .unwrap();
    assert_eq!(output, "");
}

#[test]
fn apply_template_sees_the_callers_scope() {
    let mut env = Environment::new();
    env.set_parse_nested_template(false);
    env.set_include_callback(Box::new(|_, name| {
        (name == "Child").then(|| Template::new("{{ prefix }}{{ name }};"))
    }));
    let output = env
        .render_source(
            "{% set prefix = \"# \" -%}\n## apply-template Child xs\n",
            &json!({"xs": [{"name": "a"}, {"name": "b"}]}),
        )
        .unwrap();
    assert_eq!(output, "# a;# b;");
}

#[test]
fn nested_templates_load_from_the_templates_directory() {
    let mut env = Environment::new();
    env.set_templates_dir(Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/templates"));
    let data = json!({"tables": [{"name": "country"}, {"name": "author"}]});
    let output = env
        .render_file(Path::new("TableList.tpl"), &data, None)
        .unwrap();
    assert_eq!(output, "Tables:\n- country (1)\n- author (2)\n");
    assert!(env.templates().contains_key("TableRow"));
}

#[test]
fn data_references_fan_out_across_arrays() {
    let output = render(
        "{{ tables.name }}",
        json!({"tables": [{"name": "a"}, {"name": "b"}]}),
    );
    assert_eq!(output, "[\"a\",\"b\"]");
}

#[test]
fn custom_variadic_callback() {
    let mut env = Environment::new();
    env.add_callback("argmax", VARIADIC, |args: &[Value]| {
        let items: Vec<&Value> = if args.len() == 1 && args[0].is_array() {
            args[0].as_array().map(|a| a.iter().collect()).unwrap_or_default()
        } else {
            args.iter().collect()
        };
        let mut best = 0;
        for (index, item) in items.iter().enumerate() {
            if item.as_i64() > items[best].as_i64() {
                best = index;
            }
        }
        json!(best)
    });
    let output = env
        .render_source(
            "Max element: {{ argmax(array) }}\n\
             Max element: {{ argmax([4, 2, 6]) }}\n\
             Max element: {{ argmax(4, 2, 6) }}\n",
            &json!({"array": [4, 2, 6]}),
        )
        .unwrap();
    assert_eq!(
        output,
        "Max element: 2\nMax element: 2\nMax element: 2\n"
    );
}

#[test]
fn void_callbacks_render_nothing() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let mut env = Environment::new();
    env.add_void_callback("note", 1, move |args| {
        sink.lock().unwrap().push(args[0].clone());
    });
    let output = env
        .render_source("a{{ note(\"x\") }}b", &json!({}))
        .unwrap();
    assert_eq!(output, "ab");
    assert_eq!(*seen.lock().unwrap(), vec![json!("x")]);
}

#[test]
fn rendering_is_deterministic() {
    let template = "## for k, v in data\n{{ k }}={{ v }} {{ sort(keys) }}\n## endfor\n";
    let data = json!({"data": {"b": 1, "a": 2}, "keys": ["z", "y"]});
    let first = render(template, data.clone());
    let second = render(template, data);
    assert_eq!(first, second);
}
