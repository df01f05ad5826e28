use crate::commands::{books, config, forums, jobs, stats};

#[derive(Clone, Copy)]
pub struct ExampleGroup {
    pub title: &'static str,
    pub commands: &'static [&'static str],
}

#[derive(Clone, Copy)]
pub struct CommandExample {
    pub name: &'static str,
    pub groups: &'static [ExampleGroup],
}

pub fn command_examples() -> &'static [CommandExample] {
    &[
        CommandExample {
            name: "jobs",
            groups: jobs::EXAMPLES,
        },
        CommandExample {
            name: "books",
            groups: books::EXAMPLES,
        },
        CommandExample {
            name: "forums",
            groups: forums::EXAMPLES,
        },
        CommandExample {
            name: "stats",
            groups: stats::EXAMPLES,
        },
        CommandExample {
            name: "config",
            groups: config::EXAMPLES,
        },
    ]
}
