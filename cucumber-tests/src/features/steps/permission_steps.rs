use cucumber::{given, then, when};

use crate::features::world::{status, SwitchyardWorld};
use switchyard_core::routing::AccessType;
use switchyard_core::security::{PermissionEvaluator, Principal, RoleHolder};

fn access(name: &str) -> AccessType {
    match name {
        "AllAllowed" => AccessType::AllAllowed,
        "OnlyLoggedIn" => AccessType::OnlyLoggedIn,
        "OnlyNotLoggedIn" => AccessType::OnlyNotLoggedIn,
        "OnlyWithSpecificRoles" => AccessType::OnlyWithSpecificRoles,
        other => panic!("unknown access type {}", other),
    }
}

fn roles(list: &str) -> Vec<String> {
    list.split(',').map(str::trim).filter(|r| !r.is_empty()).map(String::from).collect()
}

#[given(expr = "a route guarded by {word} allowing roles {string}")]
async fn guarded_route(world: &mut SwitchyardWorld, guard: String, allowed: String) {
    world.access = access(&guard);
    world.allowed_roles = roles(&allowed).into_iter().collect();
}

#[given("an anonymous caller")]
async fn anonymous(world: &mut SwitchyardWorld) {
    world.caller = None;
}

#[given(expr = "a caller logged in with roles {string}")]
async fn logged_in(world: &mut SwitchyardWorld, held: String) {
    world.caller = Some(Principal::new("tester", roles(&held)));
}

#[when("the permission gate evaluates the call")]
async fn evaluate(world: &mut SwitchyardWorld) {
    let holder = world.caller.as_ref().map(|p| p as &dyn RoleHolder);
    world.verdict = Some(PermissionEvaluator::decide(world.access, holder, &world.allowed_roles));
}

#[then(expr = "the verdict is {word}")]
async fn verdict(world: &mut SwitchyardWorld, expected: String) {
    assert_eq!(world.verdict, Some(status(&expected)));
}
