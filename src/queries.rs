//! GraphQL query documents
//!
//! The remote API is a single GraphQL endpoint; every extraction is a POST
//! with one of the documents built here. Field selections mirror what the
//! downstream schemas promise, so the flattener can rely on the shapes.

use std::fmt::Write;

/// Maximum page size the API accepts for connection queries.
pub const MAX_PAGE_SIZE: u32 = 50;

/// Render the optional `after:` clause for a connection query.
fn after_clause(cursor: Option<&str>) -> String {
    match cursor {
        Some(c) => format!("after: \"{}\", ", escape(c)),
        None => String::new(),
    }
}

/// Escape a string for embedding in a GraphQL document.
fn escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for ch in s.chars() {
        match ch {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            _ => {
                let _ = write!(out, "{ch}");
            }
        }
    }
    out
}

/// Query for the calling user, used as a credential check.
pub fn me() -> String {
    r"{
  me {
    id
    name
    username
    email
    avatarUrl
    created_at
    locale
    timeZone
  }
}"
    .to_string()
}

/// Query for an organization: members, pipes (with phases and phase
/// fields), and the table list with column definitions.
pub fn organization(organization_id: u64) -> String {
    format!(
        r#"{{
  organization(id: {organization_id}) {{
    name
    created_at
    members {{
      user {{
        id
        name
        email
        created_at
        avatarUrl
        username
        timeZone
        locale
      }}
      role_name
    }}
    only_admin_can_create_pipes
    only_admin_can_invite_users
    pipes(include_publics: true) {{
      id
      name
      description
      icon
      created_at
      phases {{
        id
        name
        cards_count
        fields {{
          id
          type
          required
        }}
      }}
    }}
    tables {{
      edges {{
        node {{
          id
          name
          description
          icon
          authorization
          public
          public_form
          table_records_count
          url
          table_fields {{
            id
            label
            type
            description
            is_multiple
            unique
            required
            options
          }}
        }}
      }}
    }}
  }}
}}"#
    )
}

/// Paged query for the cards of one pipe.
pub fn cards(pipe_id: &str, page_size: u32, cursor: Option<&str>) -> String {
    let after = after_clause(cursor);
    let page_size = page_size.clamp(1, MAX_PAGE_SIZE);
    format!(
        r#"{{
  cards(first: {page_size}, {after}pipe_id: {pipe_id}) {{
    edges {{
      node {{
        id
        title
        assignees {{
          id
        }}
        comments {{
          text
        }}
        comments_count
        current_phase {{
          name
        }}
        done
        due_date
        fields {{
          name
          value
          updated_at
        }}
        labels {{
          name
        }}
        phases_history {{
          phase {{
            name
          }}
          firstTimeIn
          lastTimeOut
        }}
        url
      }}
    }}
    pageInfo {{
      endCursor
      hasNextPage
    }}
  }}
}}"#
    )
}

/// Paged query for the rows of one dynamic table.
pub fn table_records(table_id: &str, page_size: u32, cursor: Option<&str>) -> String {
    let after = after_clause(cursor);
    let page_size = page_size.clamp(1, MAX_PAGE_SIZE);
    format!(
        r#"{{
  table_records(first: {page_size}, {after}table_id: "{table_id}") {{
    edges {{
      node {{
        id
        title
        url
        created_at
        updated_at
        finished_at
        due_date
        created_by {{
          id
        }}
        record_fields {{
          filled_at
          updated_at
          required
          name
          value
          array_value
          field {{
            id
            type
          }}
        }}
      }}
    }}
    pageInfo {{
      endCursor
      hasNextPage
    }}
  }}
}}"#
    )
}
