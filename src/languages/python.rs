use super::LanguageGrammar;

pub struct PythonGrammar;

impl LanguageGrammar for PythonGrammar {
    fn name(&self) -> &'static str {
        "python"
    }

    fn file_extensions(&self) -> &[&'static str] {
        &["py", "pyi"]
    }

    fn language(&self) -> tree_sitter::Language {
        tree_sitter_python::LANGUAGE.into()
    }

    fn symbols_query(&self) -> &str {
        r#"
        (function_definition
            name: (identifier) @name
        ) @function

        (class_definition
            name: (identifier) @name
        ) @class
        "#
    }

    fn imports_query(&self) -> &str {
        r#"
        (import_statement
            name: (dotted_name) @source
        ) @import

        (import_from_statement
            module_name: (dotted_name) @source
        ) @from_import

        (aliased_import
            name: (dotted_name) @source
        )
        "#
    }

    fn calls_query(&self) -> &str {
        r#"
        (call
            function: (identifier) @callee
        ) @call

        (class_definition
            superclasses: (argument_list
                (identifier) @extends
            )
        )
        "#
    }
}
