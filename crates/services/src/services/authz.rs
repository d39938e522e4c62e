//! Role and ownership policy. Every protected operation looks itself up in
//! [`POLICIES`] once per request.

use db::{models::user::User, types::RoleName};

use super::error::{Result, ServiceError};

use RoleName::{Admin, TeamLeader};

/// The authenticated caller with the role resolved for this request.
#[derive(Debug, Clone)]
pub struct Actor {
    pub user: User,
    pub role: RoleName,
}

impl Actor {
    pub fn new(user: User) -> Self {
        let role = user.role_name;
        Self { user, role }
    }

    pub fn id(&self) -> i64 {
        self.user.id
    }

    pub fn is_leader_or_admin(&self) -> bool {
        self.role.is_leader_or_admin()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    CreateProject,
    CompleteProject,
    DeleteProject,
    CreateTask,
    UpdateTask,
    ChangeTaskStatus,
    DeleteTask,
    ViewComments,
    ListUsers,
    ManageTeam,
    ChangeRole,
    SetActive,
    UpdateProfile,
}

/// How the caller must relate to the resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Relation {
    Owner,
    Assignee,
    /// Assignee or reporter of a task.
    Participant,
    SelfUser,
}

#[derive(Debug, Clone, Copy)]
pub enum Access {
    Roles(&'static [RoleName]),
    /// Any listed role, or anyone holding the relation.
    RolesOr(&'static [RoleName], Relation),
    /// One of `roles` and, unless the caller holds a `bypass` role, the
    /// relation as well.
    RolesAndRelation {
        roles: &'static [RoleName],
        relation: Relation,
        bypass: &'static [RoleName],
    },
}

#[derive(Debug, Clone, Copy)]
pub struct Policy {
    pub operation: Operation,
    pub access: Access,
    pub denied: &'static str,
}

const LEADERS: &[RoleName] = &[TeamLeader, Admin];

pub const POLICIES: &[Policy] = &[
    Policy {
        operation: Operation::CreateProject,
        access: Access::Roles(LEADERS),
        denied: "Forbidden",
    },
    Policy {
        operation: Operation::CompleteProject,
        access: Access::RolesAndRelation {
            roles: LEADERS,
            relation: Relation::Owner,
            bypass: &[Admin],
        },
        denied: "Only owner or admin can complete project",
    },
    Policy {
        operation: Operation::DeleteProject,
        access: Access::RolesAndRelation {
            roles: LEADERS,
            relation: Relation::Owner,
            bypass: &[Admin],
        },
        denied: "Only owner or admin can delete project",
    },
    Policy {
        operation: Operation::CreateTask,
        access: Access::Roles(LEADERS),
        denied: "Forbidden",
    },
    Policy {
        operation: Operation::UpdateTask,
        access: Access::RolesOr(LEADERS, Relation::Assignee),
        denied: "Forbidden",
    },
    Policy {
        operation: Operation::ChangeTaskStatus,
        access: Access::RolesOr(LEADERS, Relation::Assignee),
        denied: "Forbidden",
    },
    Policy {
        operation: Operation::DeleteTask,
        access: Access::Roles(LEADERS),
        denied: "Forbidden",
    },
    Policy {
        operation: Operation::ViewComments,
        access: Access::RolesOr(LEADERS, Relation::Participant),
        denied: "Forbidden",
    },
    Policy {
        operation: Operation::ListUsers,
        access: Access::Roles(&[Admin]),
        denied: "Forbidden",
    },
    Policy {
        operation: Operation::ManageTeam,
        access: Access::Roles(&[TeamLeader]),
        denied: "Forbidden",
    },
    Policy {
        operation: Operation::ChangeRole,
        access: Access::Roles(&[Admin]),
        denied: "Forbidden",
    },
    Policy {
        operation: Operation::SetActive,
        access: Access::Roles(&[Admin]),
        denied: "Forbidden",
    },
    Policy {
        operation: Operation::UpdateProfile,
        access: Access::RolesOr(&[Admin], Relation::SelfUser),
        denied: "Forbidden",
    },
];

/// What is known about the target of an operation.
#[derive(Debug, Clone, Copy, Default)]
pub struct ResourceFacts {
    pub owner_id: Option<i64>,
    pub assignee_id: Option<i64>,
    pub reporter_id: Option<i64>,
    pub subject_user_id: Option<i64>,
}

impl ResourceFacts {
    pub fn owned_by(owner_id: i64) -> Self {
        Self {
            owner_id: Some(owner_id),
            ..Default::default()
        }
    }

    pub fn task(assignee_id: Option<i64>, reporter_id: i64) -> Self {
        Self {
            assignee_id,
            reporter_id: Some(reporter_id),
            ..Default::default()
        }
    }

    pub fn user(subject_user_id: i64) -> Self {
        Self {
            subject_user_id: Some(subject_user_id),
            ..Default::default()
        }
    }

    fn holds(&self, actor_id: i64, relation: Relation) -> bool {
        let me = Some(actor_id);
        match relation {
            Relation::Owner => self.owner_id == me,
            Relation::Assignee => self.assignee_id == me,
            Relation::Participant => self.assignee_id == me || self.reporter_id == me,
            Relation::SelfUser => self.subject_user_id == me,
        }
    }
}

pub fn policy_for(operation: Operation) -> Result<&'static Policy> {
    POLICIES
        .iter()
        .find(|policy| policy.operation == operation)
        .ok_or_else(|| ServiceError::Internal(format!("no policy for {operation:?}")))
}

/// Role gate only. Used before the resource is loaded so a caller without
/// the role gets 403 rather than learning whether the resource exists.
pub fn require_role(actor: &Actor, operation: Operation) -> Result<()> {
    let policy = policy_for(operation)?;
    let allowed = match policy.access {
        Access::Roles(roles) | Access::RolesAndRelation { roles, .. } => {
            roles.contains(&actor.role)
        }
        // the relation can only be judged against the resource
        Access::RolesOr(..) => true,
    };
    if allowed {
        Ok(())
    } else {
        Err(ServiceError::forbidden("Forbidden"))
    }
}

/// Full check against the loaded resource.
pub fn authorize(actor: &Actor, operation: Operation, resource: &ResourceFacts) -> Result<()> {
    let policy = policy_for(operation)?;
    let allowed = match policy.access {
        Access::Roles(roles) => roles.contains(&actor.role),
        Access::RolesOr(roles, relation) => {
            roles.contains(&actor.role) || resource.holds(actor.id(), relation)
        }
        Access::RolesAndRelation {
            roles,
            relation,
            bypass,
        } => {
            if !roles.contains(&actor.role) {
                return Err(ServiceError::forbidden("Forbidden"));
            }
            bypass.contains(&actor.role) || resource.holds(actor.id(), relation)
        }
    };
    if allowed {
        Ok(())
    } else {
        Err(ServiceError::forbidden(policy.denied))
    }
}
